//! Panic payload helpers for `catch_unwind` boundaries.

use std::any::Any;

/// Best-effort text of a panic payload.
///
/// `panic!` with a literal carries a `&str`, a formatted one a `String`.
/// Anything else (e.g. `std::panic::panic_any`) reads as `"unknown panic"`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::catch_unwind;

    #[test]
    fn reads_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }

    #[test]
    fn other_payloads_are_unknown() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }

    #[test]
    fn reads_formatted_panic() {
        let payload = catch_unwind(|| -> u32 { panic!("step {} failed", 3) }).unwrap_err();
        assert_eq!(panic_message(&*payload), "step 3 failed");
    }
}
