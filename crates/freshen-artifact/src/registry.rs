use crate::builtin::{CopyFile, Gunzip, Unlink, WriteText};
use crate::error::TransformError;
use crate::transform::{Transform, TransformSpec};
use std::collections::HashMap;
use std::sync::Arc;

type Factory = Arc<dyn Fn(&TransformSpec) -> Result<Arc<dyn Transform>, TransformError> + Send + Sync>;

/// Named transform constructors. Lets an artifact be described by a
/// [`TransformSpec`] and rebuilt in another process.
#[derive(Clone)]
pub struct TransformRegistry {
    factories: HashMap<String, Factory>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// `copy`, `write`, `gunzip` and `unlink`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("copy", |_| Ok(Arc::new(CopyFile)));
        registry.register("gunzip", |_| Ok(Arc::new(Gunzip)));
        registry.register("unlink", |_| Ok(Arc::new(Unlink)));
        registry.register("write", |spec| {
            let text = spec.args.get("text").ok_or_else(|| TransformError::MissingArgument {
                name: spec.name.clone(),
                arg: "text",
            })?;
            Ok(Arc::new(WriteText::new(text.clone())))
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&TransformSpec) -> Result<Arc<dyn Transform>, TransformError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn build(&self, spec: &TransformSpec) -> Result<Arc<dyn Transform>, TransformError> {
        let factory = self
            .factories
            .get(&spec.name)
            .ok_or_else(|| TransformError::Unknown(spec.name.clone()))?;
        factory(spec)
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = TransformRegistry::builtin();
        for name in ["copy", "write", "gunzip", "unlink"] {
            assert!(registry.contains(name), "{name}");
        }
    }

    #[test]
    fn test_write_requires_text() {
        let registry = TransformRegistry::builtin();
        let err = registry.build(&TransformSpec::new("write")).err().unwrap();
        assert!(matches!(err, TransformError::MissingArgument { arg: "text", .. }));

        let built = registry.build(&TransformSpec::new("write").arg("text", "hi")).unwrap();
        assert_eq!(built.spec().unwrap().args["text"], "hi");
    }

    #[test]
    fn test_unknown_transform() {
        let err = TransformRegistry::builtin()
            .build(&TransformSpec::new("frobnicate"))
            .err()
            .unwrap();
        assert!(matches!(err, TransformError::Unknown(_)));
    }
}
