use crate::error::{QueryError, QueryResult};

pub const HASH_LENGTH: usize = 81;
pub const CHECKSUM_LENGTH: usize = 9;
pub const TRANSACTION_LENGTH: usize = 2673;
pub const SIGNATURE_FRAGMENT_LENGTH: usize = 2187;

const TRYTE_RADIX: i64 = 27;

pub fn is_trytes(value: &str) -> bool {
    value.bytes().all(|b| b == b'9' || b.is_ascii_uppercase())
}

pub fn is_empty_trytes(value: &str) -> bool {
    value.bytes().all(|b| b == b'9')
}

fn tryte_value(tryte: u8) -> Option<i64> {
    match tryte {
        b'9' => Some(0),
        b'A'..=b'M' => Some((tryte - b'A') as i64 + 1),
        b'N'..=b'Z' => Some((tryte - b'N') as i64 - 13),
        _ => None,
    }
}

fn tryte_char(value: i64) -> char {
    match value {
        0 => '9',
        1..=13 => (b'A' + (value - 1) as u8) as char,
        _ => (b'N' + (value + 13) as u8) as char,
    }
}

// balanced remainder in -1..=1, adjusting the quotient accordingly
fn balanced_div(value: i64, radix: i64) -> (i64, i64) {
    let half = radix / 2;
    let mut remainder = value % radix;
    let mut quotient = value / radix;
    if remainder > half {
        remainder -= radix;
        quotient += 1;
    } else if remainder < -half {
        remainder += radix;
        quotient -= 1;
    }
    (quotient, remainder)
}

pub fn trytes_to_trits(trytes: &str) -> QueryResult<Vec<i8>> {
    let mut trits = Vec::with_capacity(trytes.len() * 3);
    for byte in trytes.bytes() {
        let mut value = tryte_value(byte).ok_or_else(|| {
            QueryError::InvalidInput(format!("'{}' is not a tryte", byte as char))
        })?;
        for _ in 0..3 {
            let (quotient, remainder) = balanced_div(value, 3);
            trits.push(remainder as i8);
            value = quotient;
        }
    }
    Ok(trits)
}

/// Little-endian balanced ternary to integer; `None` when it does not fit an `i64`.
pub fn trits_to_int(trits: &[i8]) -> Option<i64> {
    trits.iter().rev().try_fold(0i64, |acc, trit| {
        acc.checked_mul(3)?.checked_add(*trit as i64)
    })
}

/// Decodes a tryte field holding an integer (value, timestamps, indices).
pub fn trytes_to_int(trytes: &str) -> QueryResult<i64> {
    let trits = trytes_to_trits(trytes)?;
    trits_to_int(&trits)
        .ok_or_else(|| QueryError::InvalidInput(format!("integer field {} overflows", trytes)))
}

/// Encodes an integer into exactly `length` trytes.
pub fn int_to_trytes(value: i64, length: usize) -> Option<String> {
    let mut out = String::with_capacity(length);
    let mut rest = value;
    for _ in 0..length {
        let (quotient, remainder) = balanced_div(rest, TRYTE_RADIX);
        out.push(tryte_char(remainder));
        rest = quotient;
    }
    if rest != 0 {
        return None;
    }
    Some(out)
}

pub fn pad_trytes(prefix: &str, length: usize) -> String {
    let mut out: String = prefix.chars().take(length).collect();
    while out.len() < length {
        out.push('9');
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::trytes::{
        int_to_trytes, is_empty_trytes, is_trytes, pad_trytes, trits_to_int, trytes_to_int,
        trytes_to_trits,
    };

    #[test]
    fn single_trytes_decode_to_balanced_trits() {
        assert_eq!(trytes_to_trits("9").unwrap(), vec![0, 0, 0]);
        assert_eq!(trytes_to_trits("A").unwrap(), vec![1, 0, 0]);
        assert_eq!(trytes_to_trits("M").unwrap(), vec![1, 1, 1]);
        assert_eq!(trytes_to_trits("N").unwrap(), vec![-1, -1, -1]);
        assert_eq!(trytes_to_trits("Z").unwrap(), vec![-1, 0, 0]);
        assert!(trytes_to_trits("a").is_err());
        assert!(trytes_to_trits("1").is_err());
    }

    #[test]
    fn integer_fields() {
        assert_eq!(trytes_to_int("999999999").unwrap(), 0);
        assert_eq!(trytes_to_int("A99999999").unwrap(), 1);
        assert_eq!(trytes_to_int("Z99999999").unwrap(), -1);
        assert_eq!(trits_to_int(&[-1, -1, 1]), Some(5));
        assert_eq!(int_to_trytes(42, 27).unwrap().len(), 27);
        assert_eq!(trytes_to_int(&int_to_trytes(42, 27).unwrap()).unwrap(), 42);
        assert_eq!(trytes_to_int(&int_to_trytes(-42, 27).unwrap()).unwrap(), -42);
        assert_eq!(
            trytes_to_int(&int_to_trytes(1_526_000_000_000, 9).unwrap()).unwrap(),
            1_526_000_000_000
        );
    }

    #[test]
    fn integer_too_large_for_field() {
        assert!(int_to_trytes(27, 1).is_none());
        assert!(int_to_trytes(13, 1).is_some());
        assert!(trits_to_int(&[1; 81]).is_none());
    }

    #[test]
    fn alphabet_checks() {
        assert!(is_trytes("ABC9XYZ"));
        assert!(!is_trytes("abc"));
        assert!(is_empty_trytes("9999"));
        assert!(!is_empty_trytes("99A9"));
        assert_eq!(pad_trytes("AB", 5), "AB999");
        assert_eq!(pad_trytes("ABCDEF", 3), "ABC");
    }
}
