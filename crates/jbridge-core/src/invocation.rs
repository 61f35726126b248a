//! Reified message sends

use crate::error::MarshalError;
use crate::object::Id;
use crate::selector::Selector;
use crate::signature::{MethodSignature, FIRST_EXPLICIT_ARGUMENT};
use crate::value::NativeValue;

/// One intercepted call: receiver, selector, typed argument slots and a
/// return slot. Argument indices follow the native convention where 0 is
/// self and 1 is `_cmd`; values stored in a slot always match its type.
pub struct Invocation {
    target: Id,
    selector: Selector,
    signature: MethodSignature,
    arguments: Vec<NativeValue>,
    return_value: NativeValue,
}

impl Invocation {
    /// Empty invocation with zeroed argument slots
    pub fn new(target: Id, selector: Selector, signature: MethodSignature) -> Self {
        let arguments = signature
            .explicit_arguments()
            .iter()
            .map(NativeValue::zero_for)
            .collect();
        let return_value = NativeValue::zero_for(signature.method_return_type());
        Self {
            target,
            selector,
            signature,
            arguments,
            return_value,
        }
    }

    /// Receiver
    pub fn target(&self) -> &Id {
        &self.target
    }

    /// Selector sent
    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// Signature the slots were built from
    pub fn method_signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Store argument `index` (2 or above), coercing to the slot type
    pub fn set_argument(&mut self, index: usize, value: NativeValue) -> Result<(), MarshalError> {
        let ty = self
            .signature
            .argument_type_at(index)
            .filter(|_| index >= FIRST_EXPLICIT_ARGUMENT)
            .ok_or_else(|| MarshalError::Mismatch {
                expected: format!("argument index below {}", self.signature.number_of_arguments()),
                got: format!("index {}", index),
            })?;
        self.arguments[index - FIRST_EXPLICIT_ARGUMENT] = value.coerce_to(ty)?;
        Ok(())
    }

    /// Argument `index`; 0 and 1 yield self and the selector
    pub fn argument(&self, index: usize) -> Option<NativeValue> {
        match index {
            0 => Some(NativeValue::object(self.target.clone())),
            1 => Some(NativeValue::Selector(self.selector)),
            _ => self.arguments.get(index - FIRST_EXPLICIT_ARGUMENT).cloned(),
        }
    }

    /// Explicit arguments in order
    pub fn arguments(&self) -> &[NativeValue] {
        &self.arguments
    }

    /// Store the return value, coercing to the return type
    pub fn set_return_value(&mut self, value: NativeValue) -> Result<(), MarshalError> {
        self.return_value = value.coerce_to(self.signature.method_return_type())?;
        Ok(())
    }

    /// Current return slot
    pub fn return_value(&self) -> &NativeValue {
        &self.return_value
    }

    /// Consume, yielding the return slot
    pub fn into_return_value(self) -> NativeValue {
        self.return_value
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("target", &self.target.class_name())
            .field("selector", &self.selector)
            .field("signature", &self.signature.types())
            .field("arguments", &self.arguments)
            .field("return_value", &self.return_value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NativeString;

    fn invocation(types: &str) -> Invocation {
        Invocation::new(
            NativeString::new_id("target"),
            Selector::new("test::"),
            MethodSignature::parse(types).unwrap(),
        )
    }

    #[test]
    fn test_slots_start_zeroed() {
        let inv = invocation("v@:i@");
        assert_eq!(inv.arguments(), &[NativeValue::Int(0), NativeValue::nil()]);
        assert_eq!(inv.argument(1), Some(NativeValue::Selector(Selector::new("test::"))));
        assert!(matches!(inv.argument(0), Some(NativeValue::Object(Some(_)))));
        assert_eq!(inv.argument(4), None);
    }

    #[test]
    fn test_set_argument_coerces() {
        let mut inv = invocation("v@:cd");
        inv.set_argument(2, NativeValue::Int(65)).unwrap();
        inv.set_argument(3, NativeValue::Int(1)).unwrap();
        assert_eq!(inv.arguments(), &[NativeValue::Char(65), NativeValue::Double(1.0)]);
    }

    #[test]
    fn test_implicit_and_out_of_range_slots_are_rejected() {
        let mut inv = invocation("v@:i");
        assert!(inv.set_argument(0, NativeValue::nil()).is_err());
        assert!(inv.set_argument(1, NativeValue::Int(1)).is_err());
        assert!(inv.set_argument(3, NativeValue::Int(1)).is_err());
        assert!(inv.set_argument(2, NativeValue::string("x")).is_err());
    }

    #[test]
    fn test_return_value() {
        let mut inv = invocation("B@:");
        inv.set_return_value(NativeValue::Int(3)).unwrap();
        assert_eq!(inv.return_value(), &NativeValue::Bool(true));
        assert_eq!(inv.into_return_value(), NativeValue::Bool(true));
    }
}
