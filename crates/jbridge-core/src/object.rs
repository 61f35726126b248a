//! Native dynamic objects
//!
//! The native object system dispatches every message through three hooks
//! when a receiver has no static implementation for a selector: it asks for
//! the selector's signature, reifies the call into an [`Invocation`] using
//! that signature, and hands it to the receiver to execute. `DynamicObject`
//! is that trap.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::invocation::Invocation;
use crate::selector::Selector;
use crate::signature::MethodSignature;
use crate::value::NativeValue;

/// Object reference in the native object system
pub type Id = Arc<dyn DynamicObject>;

/// Unknown-method trap implemented by every native object
pub trait DynamicObject: Send + Sync + 'static {
    /// Class name for diagnostics
    fn class_name(&self) -> String;

    /// Signature of `selector`, or [`ProxyError::Resolution`] when the
    /// receiver does not implement it
    fn method_signature_for_selector(&self, selector: Selector) -> ProxyResult<MethodSignature>;

    /// Execute a reified call, filling its return slot
    fn forward_invocation(&self, invocation: &mut Invocation) -> ProxyResult<()>;

    /// Whether the receiver implements `selector`
    fn responds_to_selector(&self, selector: Selector) -> bool;

    /// Downcasting support
    fn as_any(&self) -> &dyn Any;
}

/// Downcast an object reference to a concrete type
pub fn downcast<T: DynamicObject>(id: &Id) -> Option<&T> {
    id.as_any().downcast_ref::<T>()
}

/// Immutable native string.
///
/// Managed strings arriving in `@` slots become `NativeString`s, and a
/// `NativeString` passed to a peer becomes a managed string again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeString {
    text: String,
}

impl NativeString {
    /// Wrap text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Wrap text as an object reference
    pub fn new_id(text: impl Into<String>) -> Id {
        Arc::new(Self::new(text))
    }

    /// The text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn signature(selector: Selector) -> Option<&'static str> {
        Some(match selector.name() {
            "UTF8String" => "r*@:",
            "length" => "Q@:",
            "isEqualToString:" => "B@:@",
            "description" => "@@:",
            _ => return None,
        })
    }
}

impl DynamicObject for NativeString {
    fn class_name(&self) -> String {
        "NativeString".to_string()
    }

    fn method_signature_for_selector(&self, selector: Selector) -> ProxyResult<MethodSignature> {
        let types = Self::signature(selector).ok_or(ProxyError::Resolution(selector))?;
        Ok(MethodSignature::parse(types)?)
    }

    fn forward_invocation(&self, invocation: &mut Invocation) -> ProxyResult<()> {
        let result = match invocation.selector().name() {
            "UTF8String" => NativeValue::string(self.text.as_str()),
            // Length in UTF-16 code units
            "length" => NativeValue::ULongLong(self.text.encode_utf16().count() as u64),
            "isEqualToString:" => {
                let other = invocation.argument(2).unwrap_or_default();
                let equal = other
                    .as_object()
                    .and_then(downcast::<NativeString>)
                    .is_some_and(|s| s.text == self.text);
                NativeValue::Bool(equal)
            }
            "description" => NativeValue::object(invocation.target().clone()),
            _ => return Err(ProxyError::Resolution(invocation.selector())),
        };
        invocation.set_return_value(result)?;
        Ok(())
    }

    fn responds_to_selector(&self, selector: Selector) -> bool {
        Self::signature(selector).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
