//! Host module registration.
//!
//! A host keeps a [`ModuleRegistry`] of filesystem modules keyed by a dotted
//! identifier. Each module registers a constructor once; the host builds
//! instances from it and hands each one its configuration directive through
//! [`UnmarshalDirectives`].

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigError;
use crate::vfs::ReadOnlyFs;

/// Future produced by a module constructor.
pub type ModuleFuture = BoxFuture<'static, Box<dyn FsModule>>;

/// Builds a fresh module instance.
pub type ModuleConstructor = Arc<dyn Fn() -> ModuleFuture + Send + Sync>;

/// Anything the host can register.
pub trait Module: Send + Sync {
    /// Registry identifier, e.g. `caddy.fs.embedded`.
    fn module_id(&self) -> &'static str;
}

/// Parses the module's block of a configuration file.
pub trait UnmarshalDirectives {
    fn unmarshal_directives(&mut self, d: &mut Dispenser) -> Result<(), ConfigError>;
}

/// The capability set a filesystem module provides to the host.
pub trait FsModule: Module + ReadOnlyFs + UnmarshalDirectives {}

impl<T: Module + ReadOnlyFs + UnmarshalDirectives> FsModule for T {}

/// Registration record: identifier plus constructor.
#[derive(Clone)]
pub struct ModuleInfo {
    pub id: &'static str,
    pub new: ModuleConstructor,
}

impl std::fmt::Debug for ModuleInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInfo")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ModuleInfo {
    pub fn new<F>(id: &'static str, new: F) -> Self
    where
        F: Fn() -> ModuleFuture + Send + Sync + 'static,
    {
        Self {
            id,
            new: Arc::new(new),
        }
    }
}

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A module with this id is already registered.
    #[error("module already registered: {0}")]
    Duplicate(String),

    /// The id is empty or not dotted lowercase labels.
    #[error("invalid module id: {0:?}")]
    InvalidId(String),

    /// No module with this id.
    #[error("unknown module: {0}")]
    Unknown(String),
}

/// Registered modules, keyed by id.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<&'static str, ModuleInfo>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.ids())
            .finish()
    }
}

impl ModuleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Each id may be registered once.
    pub fn register(&self, info: ModuleInfo) -> Result<(), RegistryError> {
        if !valid_id(info.id) {
            return Err(RegistryError::InvalidId(info.id.to_string()));
        }
        let mut modules = self.modules.write();
        if modules.contains_key(info.id) {
            return Err(RegistryError::Duplicate(info.id.to_string()));
        }
        tracing::debug!(id = info.id, "registered module");
        modules.insert(info.id, info);
        Ok(())
    }

    /// Look up a module's registration.
    pub fn get(&self, id: &str) -> Option<ModuleInfo> {
        self.modules.read().get(id).cloned()
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<&'static str> {
        self.modules.read().keys().copied().collect()
    }

    /// Build a new instance of a registered module.
    pub async fn instantiate(&self, id: &str) -> Result<Box<dyn FsModule>, RegistryError> {
        // Constructor is cloned out so the lock is not held across the await.
        let new = self
            .get(id)
            .map(|info| info.new)
            .ok_or_else(|| RegistryError::Unknown(id.to_string()))?;
        Ok(new().await)
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

// ============================================================================
// Dispenser - directive token cursor
// ============================================================================

#[derive(Debug, Clone)]
struct Token {
    text: String,
    line: usize,
}

/// Cursor over the tokens of a configuration block.
///
/// Tokens are whitespace-separated; a token's line number decides whether
/// [`next_arg`](Dispenser::next_arg) may step onto it.
#[derive(Debug, Clone)]
pub struct Dispenser {
    tokens: Vec<Token>,
    cursor: Option<usize>,
}

impl Dispenser {
    /// Tokenize a block of directive text.
    pub fn parse(text: &str) -> Self {
        let tokens = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| {
                line.split_whitespace().map(move |t| Token {
                    text: t.to_string(),
                    line: i + 1,
                })
            })
            .collect();
        Self {
            tokens,
            cursor: None,
        }
    }

    /// Advance to the next token, on any line.
    pub fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.tokens.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    /// Advance only if the next token is on the current line.
    pub fn next_arg(&mut self) -> bool {
        let Some(current) = self.cursor else {
            return false;
        };
        match self.tokens.get(current + 1) {
            Some(t) if t.line == self.tokens[current].line => {
                self.cursor = Some(current + 1);
                true
            }
            _ => false,
        }
    }

    /// Text of the current token (empty before the first `next`).
    pub fn val(&self) -> &str {
        self.cursor
            .and_then(|c| self.tokens.get(c))
            .map_or("", |t| t.text.as_str())
    }

    /// Line of the current token (0 before the first `next`).
    pub fn line(&self) -> usize {
        self.cursor
            .and_then(|c| self.tokens.get(c))
            .map_or(0, |t| t.line)
    }

    /// Consume and return every remaining argument on the current line.
    pub fn remaining_args(&mut self) -> Vec<String> {
        let mut args = Vec::new();
        while self.next_arg() {
            args.push(self.val().to_string());
        }
        args
    }

    /// Error for a wrong argument count.
    pub fn arg_err(&self) -> ConfigError {
        self.err("wrong argument count or unexpected line ending")
    }

    /// Error tagged with the current directive and line.
    pub fn err(&self, message: impl std::fmt::Display) -> ConfigError {
        ConfigError::Directive {
            directive: self.val().to_string(),
            message: format!("line {}: {message}", self.line()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{FileHandle, VfsError, VfsResult};
    use async_trait::async_trait;

    #[derive(Default)]
    struct EchoFs {
        args: Vec<String>,
    }

    #[async_trait]
    impl ReadOnlyFs for EchoFs {
        async fn open(&self, path: &str) -> VfsResult<FileHandle> {
            Err(VfsError::not_found(path))
        }
    }

    impl Module for EchoFs {
        fn module_id(&self) -> &'static str {
            "test.fs.echo"
        }
    }

    impl UnmarshalDirectives for EchoFs {
        fn unmarshal_directives(&mut self, d: &mut Dispenser) -> Result<(), ConfigError> {
            if !d.next() {
                return Err(d.arg_err());
            }
            self.args = d.remaining_args();
            Ok(())
        }
    }

    fn echo_info() -> ModuleInfo {
        ModuleInfo::new("test.fs.echo", || {
            Box::pin(async { Box::new(EchoFs::default()) as Box<dyn FsModule> })
        })
    }

    #[tokio::test]
    async fn test_register_and_instantiate() {
        let registry = ModuleRegistry::new();
        registry.register(echo_info()).unwrap();
        assert_eq!(registry.ids(), ["test.fs.echo"]);

        let mut module = registry.instantiate("test.fs.echo").await.unwrap();
        assert_eq!(module.module_id(), "test.fs.echo");
        assert!(module.open("x").await.is_err());

        let mut d = Dispenser::parse("echo a b\nnext c");
        module.unmarshal_directives(&mut d).unwrap();
    }

    #[test]
    fn test_duplicate_and_invalid_ids() {
        let registry = ModuleRegistry::new();
        registry.register(echo_info()).unwrap();
        assert_eq!(
            registry.register(echo_info()),
            Err(RegistryError::Duplicate("test.fs.echo".into()))
        );

        let bad = ModuleInfo::new("Bad..id", || {
            Box::pin(async { Box::new(EchoFs::default()) as Box<dyn FsModule> })
        });
        assert!(matches!(registry.register(bad), Err(RegistryError::InvalidId(_))));
        assert!(registry.get("Bad..id").is_none());
    }

    #[tokio::test]
    async fn test_instantiate_unknown() {
        let registry = ModuleRegistry::new();
        assert!(matches!(
            registry.instantiate("nope").await,
            Err(RegistryError::Unknown(_))
        ));
    }

    #[test]
    fn test_dispenser_args_stop_at_line_end() {
        let mut d = Dispenser::parse("fs embedded extra\nroot /srv");
        assert_eq!(d.val(), "");
        assert!(!d.next_arg());

        assert!(d.next());
        assert_eq!(d.val(), "fs");
        assert_eq!(d.remaining_args(), ["embedded", "extra"]);

        assert!(d.next());
        assert_eq!(d.val(), "root");
        assert_eq!(d.line(), 2);
        assert!(d.next_arg());
        assert_eq!(d.val(), "/srv");
        assert!(!d.next());
    }

    #[test]
    fn test_dispenser_errors_carry_position() {
        let mut d = Dispenser::parse("\nfs");
        d.next();
        let msg = d.arg_err().to_string();
        assert!(msg.contains("fs"), "{msg}");
        assert!(msg.contains("line 2"), "{msg}");
    }
}
