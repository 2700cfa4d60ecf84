//! Two external collaborators `spec.md` §6 leaves abstract: an exception
//! analyser that turns an opaque thrown object into a printable chain, and a
//! debugger-attached probe consulted before triggering a breakpoint.
//!
//! Rust has no RTTI-based exception hierarchy the way the original design's
//! host language does; the nearest equivalent is the payload a panic carries
//! through `std::panic::catch_unwind`, which is `Box<dyn Any + Send>` with
//! no general downcasting beyond the shapes `panic!` itself produces
//! (`&'static str`, `String`) plus whatever an `anyhow::Error` caller chose
//! to carry.

use std::any::Any;

/// One link in a printable exception chain.
pub struct ExceptionLink {
    pub type_name: &'static str,
    pub message: String,
}

/// Given an opaque panic payload, produces a lazy sequence of
/// `{type_name, message}` records, innermost cause last, the way `spec.md`
/// §6 describes for the exception-analyser collaborator. The core iterates
/// this to print exception chains without knowing the host's exception
/// hierarchy.
pub trait ExceptionAnalyser {
    fn analyse(&self, payload: &(dyn Any + Send)) -> Vec<ExceptionLink>;
}

/// Recognises the payload shapes `std::panic::catch_unwind` actually
/// produces: a `&'static str`, an owned `String`, or an `anyhow::Error`
/// (whose `.chain()` is walked in full, grounded on the teacher's use of
/// `anyhow::Context` chains for layered error messages).
pub struct StdExceptionAnalyser;

impl ExceptionAnalyser for StdExceptionAnalyser {
    fn analyse(&self, payload: &(dyn Any + Send)) -> Vec<ExceptionLink> {
        if let Some(err) = payload.downcast_ref::<anyhow::Error>() {
            return err
                .chain()
                .map(|cause| ExceptionLink {
                    type_name: "anyhow::Error",
                    message: cause.to_string(),
                })
                .collect();
        }
        if let Some(s) = payload.downcast_ref::<&'static str>() {
            return vec![ExceptionLink {
                type_name: "panic",
                message: (*s).to_string(),
            }];
        }
        if let Some(s) = payload.downcast_ref::<String>() {
            return vec![ExceptionLink {
                type_name: "panic",
                message: s.clone(),
            }];
        }
        vec![ExceptionLink {
            type_name: "panic",
            message: "non-string panic payload".to_string(),
        }]
    }
}

/// `is_debugger_attached()`: on Linux, read `/proc/self/status`'s
/// `TracerPid` field; nonzero means a tracer (debugger) is attached.
/// Unconditionally `false` elsewhere — there is no portable equivalent and
/// `spec.md` only requires *a* boolean predicate, not perfect detection on
/// every platform.
#[cfg(target_os = "linux")]
pub fn is_debugger_attached() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|rest| rest.trim().parse::<u32>().ok())
        .is_some_and(|pid| pid != 0)
}

#[cfg(not(target_os = "linux"))]
pub fn is_debugger_attached() -> bool {
    false
}

/// Triggers a breakpoint trap if one is available on this platform;
/// otherwise a no-op. Called when a listener sets `should_break` on a
/// failing assertion, or before a hard error terminates the process.
pub fn breakpoint() {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        std::arch::asm!("int3");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyses_str_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let links = StdExceptionAnalyser.analyse(payload.as_ref());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].message, "boom");
    }

    #[test]
    fn analyses_anyhow_chain() {
        let err = anyhow::anyhow!("outer").context("wrapper");
        let payload: Box<dyn Any + Send> = Box::new(err);
        let links = StdExceptionAnalyser.analyse(payload.as_ref());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].message, "wrapper");
        assert_eq!(links[1].message, "outer");
    }
}
