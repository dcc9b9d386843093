//! The central value-converter registry.
//!
//! Hydration routes every non-builtin field through the registry before
//! falling back to the field type's own [`crate::hydrate::FromSqlValue`]
//! implementation. Hosts register converters keyed by the Rust target type;
//! a registered converter overrides the built-in conversion for that type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::datetime::DateTimeConfig;
use sqlit_core::Value;

type ConverterFn = Arc<dyn Fn(&Value, &DateTimeConfig) -> Option<Box<dyn Any>> + Send + Sync>;

/// Maps a target Rust type to a conversion from raw SQL values.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<TypeId, ConverterFn>,
}

impl ConverterRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for `T`, replacing any previous one.
    ///
    /// The converter returns `None` when the raw value has no sensible
    /// interpretation as `T`; hydration then reports the failure against
    /// the target entity.
    pub fn register<T, F>(&mut self, convert: F)
    where
        T: 'static,
        F: Fn(&Value, &DateTimeConfig) -> Option<T> + Send + Sync + 'static,
    {
        self.converters.insert(
            TypeId::of::<T>(),
            Arc::new(move |value, config| {
                convert(value, config).map(|v| Box::new(v) as Box<dyn Any>)
            }),
        );
    }

    /// Converts `value` into `T` through a registered converter, if any.
    ///
    /// Outer `None`: no converter registered for `T`. Inner `None`: the
    /// converter rejected the value.
    #[must_use]
    pub fn convert<T: 'static>(
        &self,
        value: &Value,
        config: &DateTimeConfig,
    ) -> Option<Option<T>> {
        let converter = self.converters.get(&TypeId::of::<T>())?;
        Some(converter(value, config).and_then(|boxed| boxed.downcast::<T>().ok().map(|b| *b)))
    }

    /// `true` when a converter for `T` is registered.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered converters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// `true` when no converters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Temperature(f64);

    #[test]
    fn registered_converter_is_consulted() {
        let mut registry = ConverterRegistry::new();
        registry.register(|value, _config| match value {
            Value::Float(f) => Some(Temperature(*f)),
            Value::Int(n) => Some(Temperature(*n as f64)),
            _ => None,
        });

        let config = DateTimeConfig::default();
        assert_eq!(
            registry.convert::<Temperature>(&Value::Int(21), &config),
            Some(Some(Temperature(21.0)))
        );
        assert_eq!(
            registry.convert::<Temperature>(&Value::Text("warm".into()), &config),
            Some(None)
        );
        assert_eq!(registry.convert::<String>(&Value::Int(1), &config), None);
    }
}
