/*!
    Rational numbers for time bases and frame rates.
*/

use std::cmp::Ordering;
use std::fmt;

/**
    A rational number `num / den`.

    Used for stream time bases (seconds per tick) and frame rates
    (frames per second). Both parts are kept as FFmpeg stores them.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        The time base of a stream ticking `rate` times per second, i.e. `1 / rate`.
    */
    pub const fn per_second(rate: i32) -> Self {
        Self { num: 1, den: rate }
    }

    /**
        Swap numerator and denominator (frame rate to time base and back).
    */
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /**
        Compare two timestamps expressed in different time bases, exactly.

        `a` ticks of `tb_a` are compared against `b` ticks of `tb_b` by
        cross-multiplying in 128-bit integers, so there is no rounding and no
        drift no matter how long the stream runs. Time bases must have
        positive denominators.
    */
    pub fn compare_ts(a: i64, tb_a: Rational, b: i64, tb_b: Rational) -> Ordering {
        let lhs = a as i128 * tb_a.num as i128 * tb_b.den as i128;
        let rhs = b as i128 * tb_b.num as i128 * tb_a.den as i128;
        lhs.cmp(&rhs)
    }

    /**
        Convert `ts` ticks of `from` into ticks of `to`, rounding to the
        nearest tick (halfway cases away from zero).
    */
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        if from == to {
            return ts;
        }

        let num = ts as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded as i64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
