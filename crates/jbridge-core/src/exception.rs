//! Exception bridge
//!
//! Failures detected on the native side are raised into the managed runtime
//! as ordinary exceptions; managed exceptions thrown during a forwarded call
//! are taken off the context right after the call so that nothing is left
//! pending for an unrelated later operation.

use jbridge_sdk::{JValue, JniEnv, ObjectRef};

const THROWABLE: &str = "java/lang/Throwable";

/// Raise `class_name` with `message` as the pending exception on `env`.
///
/// The class must exist in the runtime's standard library; if it does not,
/// or the throw itself fails, the embedding is broken and `env.fatal_error`
/// is called.
pub fn raise(env: &dyn JniEnv, class_name: &str, message: &str) {
    if env.exception_check() {
        log::debug!("not raising {} over a pending exception: {}", class_name, message);
        return;
    }
    let thrown = env
        .find_class(class_name)
        .and_then(|class| env.throw_new(class, message));
    if let Err(e) = thrown {
        env.fatal_error(&format!("cannot raise {}: {}", class_name, e));
    }
}

/// Managed exception taken off an execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrownException {
    /// Class of the throwable (`java/lang/IllegalStateException`)
    pub class_name: String,
    /// `getMessage()`, if any
    pub message: Option<String>,
}

impl ThrownException {
    /// Message, falling back to the class name
    pub fn describe(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.class_name.replace('/', "."),
        }
    }
}

/// Clear the pending exception, if any, and describe it
pub fn take_pending(env: &dyn JniEnv) -> Option<ThrownException> {
    let thrown = env.exception_occurred()?;
    env.exception_clear();

    let class_name = env
        .get_object_class(thrown)
        .and_then(|class| env.class_name(class))
        .unwrap_or_else(|_| THROWABLE.to_string());
    let message = message_of(env, thrown);
    env.delete_local_ref(thrown);

    Some(ThrownException {
        class_name,
        message,
    })
}

fn message_of(env: &dyn JniEnv, thrown: ObjectRef) -> Option<String> {
    let throwable = env.find_class(THROWABLE).ok()?;
    let get_message = env
        .get_method_id(throwable, "getMessage", "()Ljava/lang/String;")
        .ok()?;
    let result = env.call_method(thrown, get_message, &[]);
    if env.exception_check() {
        // getMessage itself threw; keep the original
        env.exception_clear();
        return None;
    }
    let message = match result.ok()? {
        JValue::Object(Some(s)) => s,
        _ => return None,
    };
    let text = env.get_string_utf_chars(message).ok();
    env.delete_local_ref(message);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbridge_vm::Vm;

    #[test]
    fn test_raise_then_take() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();

        raise(&*env, "java/lang/IllegalStateException", "bad state");
        assert!(env.exception_check());

        let thrown = take_pending(&*env).unwrap();
        assert_eq!(thrown.class_name, "java/lang/IllegalStateException");
        assert_eq!(thrown.message.as_deref(), Some("bad state"));
        assert!(!env.exception_check());
        assert!(take_pending(&*env).is_none());
    }

    #[test]
    fn test_raise_keeps_earlier_exception() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        raise(&*env, "java/lang/IllegalArgumentException", "first");
        raise(&*env, "java/lang/RuntimeException", "second");
        let thrown = take_pending(&*env).unwrap();
        assert_eq!(thrown.message.as_deref(), Some("first"));
    }

    #[test]
    #[should_panic(expected = "cannot raise")]
    fn test_raise_missing_class_is_fatal() {
        let vm = Vm::new().unwrap();
        let env = vm.attach().unwrap();
        raise(&*env, "com/example/NoSuchException", "unreachable");
    }

    #[test]
    fn test_describe_without_message() {
        let thrown = ThrownException {
            class_name: "java/lang/NullPointerException".to_string(),
            message: None,
        };
        assert_eq!(thrown.describe(), "java.lang.NullPointerException");
    }
}
