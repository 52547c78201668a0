use crate::ast::Keyword;
use crate::error::{Error, Result};
use crate::interpreter::value::Value;

const MAX_DENOMINATOR: i128 = 1_000_000;

fn expect_n_args(args: &[Value], n: usize, keyword: Keyword) -> Result<()> {
    if args.len() != n {
        return Err(Error::Type(format!(
            "Expected {n} argument for function {keyword}, got {}.",
            args.len()
        )));
    }
    Ok(())
}

fn expect_number(v: &Value, keyword: Keyword) -> Result<f64> {
    v.as_number().ok_or_else(|| {
        Error::Type(format!(
            "{keyword}: expected a number, got {}",
            v.type_name()
        ))
    })
}

fn domain_error() -> Error {
    Error::Value("math domain error".to_string())
}

/// Applies one of the single-argument keywords. `plot` is handled by the
/// interpreter because it needs to call back into user functions.
pub fn call(keyword: Keyword, args: &[Value]) -> Result<Value> {
    expect_n_args(args, 1, keyword)?;
    let arg = &args[0];

    if keyword == Keyword::Bool {
        return Ok(Value::Boolean(arg.truthy()));
    }

    let x = expect_number(arg, keyword)?;
    let result = match keyword {
        Keyword::Sin => x.sin(),
        Keyword::Cos => x.cos(),
        Keyword::Tan => x.tan(),
        Keyword::Asin if (-1.0..=1.0).contains(&x) => x.asin(),
        Keyword::Acos if (-1.0..=1.0).contains(&x) => x.acos(),
        Keyword::Asin | Keyword::Acos => return Err(domain_error()),
        Keyword::Atan => x.atan(),
        Keyword::Abs => x.abs(),
        Keyword::Sqrt if x >= 0.0 => x.sqrt(),
        Keyword::Sqrt => return Err(domain_error()),
        Keyword::Factorial => factorial(x)?,
        Keyword::Fraction => return Ok(Value::String(fraction(x)?)),
        Keyword::Bool | Keyword::Plot => {
            return Err(Error::Type(format!("{keyword} cannot be applied here")));
        }
    };

    Ok(Value::Number(result))
}

pub fn factorial(x: f64) -> Result<f64> {
    if x.fract() != 0.0 || !x.is_finite() {
        return Err(Error::Type(format!(
            "Expected an integral value for factorial, got {x}"
        )));
    }
    if x < 0.0 {
        return Err(Error::Value(
            "factorial() not defined for negative values".to_string(),
        ));
    }
    // 171! no longer fits in an f64
    if x > 170.0 {
        return Ok(f64::INFINITY);
    }
    Ok((1..=x as u64).fold(1.0, |acc, n| acc * n as f64))
}

/// Closest fraction to `x` with a denominator of at most one million,
/// written as `n/d` (or just `n` for whole numbers).
pub fn fraction(x: f64) -> Result<String> {
    if x.is_finite() && x.fract() == 0.0 {
        return Ok(whole_number(x));
    }

    let (numerator, denominator) = exact_ratio(x)?;
    let sign = if numerator < 0 { -1 } else { 1 };
    let (n, d) = limit_denominator(numerator.abs(), denominator, MAX_DENOMINATOR);
    let n = sign * n;

    if d == 1 {
        Ok(format!("{n}"))
    } else {
        Ok(format!("{n}/{d}"))
    }
}

/// Exact decimal form of an integral float, however large.
fn whole_number(x: f64) -> String {
    if x.abs() < 9.0e18 {
        return format!("{}", x as i64);
    }

    let bits = x.to_bits();
    let mantissa = (bits & 0xf_ffff_ffff_ffff) | 0x10_0000_0000_0000;
    let shift = ((bits >> 52) & 0x7ff) as u32 - 1075;

    // little-endian base 10 digits, doubled `shift` times
    let mut digits: Vec<u8> = mantissa.to_string().bytes().rev().map(|b| b - b'0').collect();
    for _ in 0..shift {
        let mut carry = 0;
        for d in digits.iter_mut() {
            let v = *d * 2 + carry;
            *d = v % 10;
            carry = v / 10;
        }
        if carry > 0 {
            digits.push(carry);
        }
    }

    let sign = if x < 0.0 { "-" } else { "" };
    let magnitude: String = digits.iter().rev().map(|d| char::from(b'0' + d)).collect();
    format!("{sign}{magnitude}")
}

/// Decomposes a finite float into an exact `numerator / 2^k` ratio.
fn exact_ratio(x: f64) -> Result<(i128, i128)> {
    if !x.is_finite() {
        return Err(Error::Value(format!("cannot convert {x} to a fraction")));
    }
    if x == 0.0 {
        return Ok((0, 1));
    }

    let bits = x.to_bits();
    let sign: i128 = if bits >> 63 == 0 { 1 } else { -1 };
    let raw_exponent = ((bits >> 52) & 0x7ff) as i32;
    let (mut mantissa, mut exponent) = if raw_exponent == 0 {
        ((bits & 0xf_ffff_ffff_ffff) as i128, -1074)
    } else {
        (((bits & 0xf_ffff_ffff_ffff) | 0x10_0000_0000_0000) as i128, raw_exponent - 1075)
    };

    while mantissa % 2 == 0 && exponent < 0 {
        mantissa /= 2;
        exponent += 1;
    }

    if exponent >= 0 {
        if exponent > 70 {
            return Err(Error::Value(format!("{x} is too large for a fraction")));
        }
        return Ok((sign * (mantissa << exponent), 1));
    }

    // Values this small round to zero under any allowed denominator.
    if exponent < -120 {
        return Ok((0, 1));
    }
    Ok((sign * mantissa, 1i128 << -exponent))
}

/// Best rational approximation of `p/q` (p >= 0) with denominator at most `max`.
fn limit_denominator(p: i128, q: i128, max: i128) -> (i128, i128) {
    if q <= max {
        let g = gcd(p, q);
        return (p / g, q / g);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0i128, 1i128, 1i128, 0i128);
    let (mut n, mut d) = (p, q);
    loop {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
        if d == 0 {
            return (p1, q1);
        }
    }

    let k = (max - q0) / q1;
    let (bound1_n, bound1_d) = (p0 + k * p1, q0 + k * q1);
    let (bound2_n, bound2_d) = (p1, q1);

    let target = p as f64 / q as f64;
    let err1 = (bound1_n as f64 / bound1_d as f64 - target).abs();
    let err2 = (bound2_n as f64 / bound2_d as f64 - target).abs();
    if err2 <= err1 {
        (bound2_n, bound2_d)
    } else {
        (bound1_n, bound1_d)
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs().max(1)
}
