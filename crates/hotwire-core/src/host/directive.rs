use anyhow::{bail, Context};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::info;

use crate::errors::{HotError, Result};
use crate::fs::FileSystem;
use crate::loader::ModuleLoader;
use crate::module_id::ModuleId;
use crate::session::ModuleScope;

/// One line of a directive module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `require <request>`
    Require(String),
    /// `accept`
    Accept,
    /// `accept panic <message>`: accept with a callback that panics
    AcceptPanic(String),
    /// `print <text>`
    Print(String),
    /// `fail <message>`
    Fail(String),
}

/// Parse a directive module.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_directives(source: &str) -> anyhow::Result<Vec<Directive>> {
    let mut directives = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        let directive = match (keyword, rest) {
            ("require", "") => bail!("line {}: require needs a module request", index + 1),
            ("require", request) => Directive::Require(request.to_string()),
            ("accept", "") => Directive::Accept,
            ("accept", rest) => match rest.split_once(char::is_whitespace) {
                Some(("panic", message)) => Directive::AcceptPanic(message.trim().to_string()),
                None if rest == "panic" => Directive::AcceptPanic("accept callback panicked".into()),
                _ => bail!("line {}: unknown accept form '{}'", index + 1, rest),
            },
            ("print", text) => Directive::Print(text.to_string()),
            ("fail", message) => Directive::Fail(message.to_string()),
            (other, _) => bail!("line {}: unknown directive '{}'", index + 1, other),
        };
        directives.push(directive);
    }

    Ok(directives)
}

/// An accept callback invocation observed by the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub module: ModuleId,
    pub error: Option<String>,
}

/// What the directive modules did, for tests and the CLI
#[derive(Debug, Default)]
pub struct Journal {
    evaluations: RefCell<FxHashMap<ModuleId, usize>>,
    callbacks: RefCell<Vec<CallbackRecord>>,
    output: RefCell<Vec<String>>,
}

impl Journal {
    /// How many times `id` has been evaluated.
    pub fn evaluations(&self, id: &str) -> usize {
        self.evaluations.borrow().get(id).copied().unwrap_or(0)
    }

    pub fn callbacks(&self) -> Vec<CallbackRecord> {
        self.callbacks.borrow().clone()
    }

    /// How many times the accept callback of `id` has fired.
    pub fn callback_count(&self, id: &str) -> usize {
        self.callbacks
            .borrow()
            .iter()
            .filter(|record| record.module.as_str() == id)
            .count()
    }

    pub fn output(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    fn record_evaluation(&self, id: &ModuleId) {
        *self
            .evaluations
            .borrow_mut()
            .entry(id.clone())
            .or_default() += 1;
    }

    fn record_callback(&self, module: &ModuleId, error: Option<&HotError>) {
        self.callbacks.borrow_mut().push(CallbackRecord {
            module: module.clone(),
            error: error.map(|e| e.to_string()),
        });
    }

    fn record_output(&self, text: &str) {
        self.output.borrow_mut().push(text.to_string());
    }
}

/// Loader for line-oriented directive modules stored on a [`FileSystem`].
///
/// `./`, `../` and absolute requests name files; any other request without
/// a path separator is a built-in module that is always loaded and never
/// tracked.
pub struct DirectiveLoader {
    fs: Arc<dyn FileSystem>,
    cache: RefCell<FxHashSet<ModuleId>>,
    journal: Rc<Journal>,
}

impl DirectiveLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: RefCell::new(FxHashSet::default()),
            journal: Rc::new(Journal::default()),
        }
    }

    pub fn journal(&self) -> &Rc<Journal> {
        &self.journal
    }

    fn is_builtin(id: &ModuleId) -> bool {
        !id.has_path_separator()
    }

    fn is_file_request(request: &str) -> bool {
        request.starts_with("./")
            || request.starts_with("../")
            || request.starts_with(".\\")
            || request.starts_with("..\\")
            || Path::new(request).is_absolute()
    }

    fn base_dir(&self, parent: Option<&ModuleId>) -> Result<PathBuf> {
        match parent.and_then(|p| p.as_path().parent()) {
            Some(dir) => Ok(dir.to_path_buf()),
            None => Ok(self.fs.current_dir()?),
        }
    }

    fn run(
        &self,
        id: &ModuleId,
        directives: &[Directive],
        scope: &mut ModuleScope<'_>,
    ) -> anyhow::Result<()> {
        for directive in directives {
            match directive {
                Directive::Require(request) => {
                    scope.require(request)?;
                }
                Directive::Accept => {
                    let journal = Rc::clone(&self.journal);
                    let module = id.clone();
                    scope.accept_with(move |error| journal.record_callback(&module, error));
                }
                Directive::AcceptPanic(message) => {
                    let message = message.clone();
                    scope.accept_with(move |_| panic!("{}", message));
                }
                Directive::Print(text) => {
                    info!("[{}] {}", id, text);
                    self.journal.record_output(text);
                }
                Directive::Fail(message) => bail!("{}", message),
            }
        }
        Ok(())
    }
}

impl ModuleLoader for DirectiveLoader {
    fn resolve(&self, request: &str, parent: Option<&ModuleId>) -> Result<ModuleId> {
        let unresolved = || HotError::Resolution {
            request: request.to_string(),
            parent: parent.cloned(),
        };

        if !Self::is_file_request(request) {
            let id = ModuleId::new(request);
            return if Self::is_builtin(&id) && !request.is_empty() {
                Ok(id)
            } else {
                Err(unresolved())
            };
        }

        let candidate = self.base_dir(parent)?.join(request);
        self.fs
            .canonicalize(&candidate)
            .map(ModuleId::from)
            .map_err(|_| unresolved())
    }

    fn is_cached(&self, id: &ModuleId) -> bool {
        Self::is_builtin(id) || self.cache.borrow().contains(id)
    }

    fn evaluate(&self, id: &ModuleId, scope: &mut ModuleScope<'_>) -> anyhow::Result<()> {
        let source = self
            .fs
            .read_file(id.as_path())
            .with_context(|| format!("cannot read {}", id))?;
        let directives = parse_directives(&source)?;

        self.cache.borrow_mut().insert(id.clone());
        self.journal.record_evaluation(id);

        let result = self.run(id, &directives, scope);
        if result.is_err() {
            self.cache.borrow_mut().remove(id);
        }
        result
    }

    fn evict_from_cache(&self, id: &ModuleId) {
        self.cache.borrow_mut().remove(id);
    }
}
