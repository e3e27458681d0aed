//! Model binding: delegate a structured-model parameter to a registered
//! handler (§4.5).

use std::sync::Arc;

use serde_json::Value;

/// A handler capable of resolving raw decoded data into an instance of a
/// named structured model, and converting it back for responses (§4.5).
pub trait ModelHandler: Send + Sync {
    fn can_handle(&self, type_name: &str) -> bool;

    /// Higher wins when more than one handler can handle the same type.
    fn priority(&self) -> i32 {
        0
    }

    fn resolve(&self, type_name: &str, data: &Value) -> Result<Value, String>;

    fn to_dict(&self, type_name: &str, instance: &Value) -> Value;
}

/// The built-in fallback: treats any JSON object as the model instance
/// verbatim. Registered applications typically add a handler ahead of this
/// one (by priority) for real field-level validation against a concrete
/// record type.
struct RecordModelHandler;

impl ModelHandler for RecordModelHandler {
    fn can_handle(&self, _type_name: &str) -> bool {
        true
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn resolve(&self, type_name: &str, data: &Value) -> Result<Value, String> {
        if data.is_object() {
            Ok(data.clone())
        } else {
            Err(format!("expected an object for model {type_name}, got {data}"))
        }
    }

    fn to_dict(&self, _type_name: &str, instance: &Value) -> Value {
        instance.clone()
    }
}

/// Handlers tried in descending priority; the first `can_handle` match wins
/// (§4.5).
pub struct ModelHandlerRegistry {
    handlers: Vec<Arc<dyn ModelHandler>>,
}

impl Default for ModelHandlerRegistry {
    fn default() -> Self {
        Self { handlers: vec![Arc::new(RecordModelHandler)] }
    }
}

impl ModelHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ModelHandler>) {
        self.handlers.push(handler);
    }

    pub fn resolve(&self, type_name: &str, data: &Value) -> Result<Value, String> {
        let mut candidates: Vec<&Arc<dyn ModelHandler>> =
            self.handlers.iter().filter(|h| h.can_handle(type_name)).collect();
        candidates.sort_by_key(|h| std::cmp::Reverse(h.priority()));
        match candidates.first() {
            Some(handler) => handler.resolve(type_name, data),
            None => Err(format!("no model handler registered for {type_name}")),
        }
    }
}
