//! Native message dispatch
//!
//! `msg_send` is what the native object system does when a receiver has no
//! static implementation: resolve the signature, reify the call, forward it.
//! A receiver that cannot resolve the selector does not understand it, which
//! is an ordinary error rather than a crash.

use crate::error::{DispatchError, MarshalError, ProxyError};
use crate::invocation::Invocation;
use crate::object::Id;
use crate::selector::Selector;
use crate::signature::{MethodSignature, FIRST_EXPLICIT_ARGUMENT};
use crate::value::NativeValue;

/// Send `selector` with `args` (self and `_cmd` excluded) to `receiver`
pub fn msg_send(receiver: &Id, selector: Selector, args: &[NativeValue]) -> Result<NativeValue, DispatchError> {
    let signature = resolve(receiver, selector)?;
    send_with_signature(receiver, selector, signature, args)
}

/// Resolve `selector` on `receiver`, mapping an unknown selector to
/// [`DispatchError::UnrecognizedSelector`]
pub fn resolve(receiver: &Id, selector: Selector) -> Result<MethodSignature, DispatchError> {
    match receiver.method_signature_for_selector(selector) {
        Ok(signature) => Ok(signature),
        Err(ProxyError::Resolution(_)) => Err(DispatchError::UnrecognizedSelector {
            class: receiver.class_name(),
            selector,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Build and forward an invocation for an already resolved signature
pub fn send_with_signature(
    receiver: &Id,
    selector: Selector,
    signature: MethodSignature,
    args: &[NativeValue],
) -> Result<NativeValue, DispatchError> {
    let expected = signature.explicit_arguments().len();
    if args.len() != expected {
        return Err(DispatchError::ArgumentCount {
            selector,
            expected,
            got: args.len(),
        });
    }

    let mut invocation = Invocation::new(receiver.clone(), selector, signature);
    for (offset, arg) in args.iter().enumerate() {
        let index = FIRST_EXPLICIT_ARGUMENT + offset;
        invocation
            .set_argument(index, arg.clone())
            .map_err(|e| slot_error(e, format!("argument {}", index)))?;
    }

    log::trace!("-[{} {}]", receiver.class_name(), selector);
    receiver.forward_invocation(&mut invocation)?;
    Ok(invocation.into_return_value())
}

/// Whether `receiver` answers `selector`; nil answers nothing
pub fn responds(receiver: Option<&Id>, selector: Selector) -> bool {
    receiver.is_some_and(|r| r.responds_to_selector(selector))
}

fn slot_error(error: MarshalError, slot: String) -> DispatchError {
    match error {
        MarshalError::Mismatch { expected, got } => DispatchError::TypeMismatch { slot, expected, got },
        other => ProxyError::Marshal(other).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::ProxyResult;
    use crate::object::DynamicObject;

    /// Counter answering `add:` and `total`
    #[derive(Default)]
    struct Counter {
        total: AtomicUsize,
        forwarded: AtomicUsize,
    }

    impl DynamicObject for Counter {
        fn class_name(&self) -> String {
            "Counter".to_string()
        }

        fn method_signature_for_selector(&self, selector: Selector) -> ProxyResult<MethodSignature> {
            let types = match selector.name() {
                "add:" => "v@:Q",
                "total" => "Q@:",
                _ => return Err(ProxyError::Resolution(selector)),
            };
            Ok(MethodSignature::parse(types)?)
        }

        fn forward_invocation(&self, invocation: &mut Invocation) -> ProxyResult<()> {
            self.forwarded.fetch_add(1, Ordering::Relaxed);
            match invocation.selector().name() {
                "add:" => {
                    let n = invocation.arguments()[0].as_i64().unwrap_or(0) as usize;
                    self.total.fetch_add(n, Ordering::Relaxed);
                }
                _ => {
                    let total = self.total.load(Ordering::Relaxed) as u64;
                    invocation.set_return_value(NativeValue::ULongLong(total))?;
                }
            }
            Ok(())
        }

        fn responds_to_selector(&self, selector: Selector) -> bool {
            self.method_signature_for_selector(selector).is_ok()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_send_coerces_arguments() {
        let counter: Id = Arc::new(Counter::default());
        msg_send(&counter, Selector::new("add:"), &[NativeValue::Int(4)]).unwrap();
        msg_send(&counter, Selector::new("add:"), &[NativeValue::Char(3)]).unwrap();
        assert_eq!(
            msg_send(&counter, Selector::new("total"), &[]).unwrap(),
            NativeValue::ULongLong(7)
        );
    }

    #[test]
    fn test_unrecognized_selector_never_forwards() {
        let counter = Arc::new(Counter::default());
        let id: Id = counter.clone();
        let err = msg_send(&id, Selector::new("reset"), &[]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnrecognizedSelector {
                class: "Counter".to_string(),
                selector: Selector::new("reset"),
            }
        );
        assert_eq!(err.to_string(), "Counter does not recognize selector reset");
        assert_eq!(counter.forwarded.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_argument_checks() {
        let id: Id = Arc::new(Counter::default());
        assert!(matches!(
            msg_send(&id, Selector::new("add:"), &[]),
            Err(DispatchError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            msg_send(&id, Selector::new("add:"), &[NativeValue::string("four")]),
            Err(DispatchError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_responds() {
        let id: Id = Arc::new(Counter::default());
        assert!(responds(Some(&id), Selector::new("total")));
        assert!(!responds(Some(&id), Selector::new("reset")));
        assert!(!responds(None, Selector::new("total")));
    }
}
