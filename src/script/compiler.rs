//! Bundles a config script and its local imports into one artifact.
//!
//! Local imports are `require` calls whose specifier starts with `./` or
//! `../`. Each one is inlined as a `package.preload` loader keyed by a
//! stable module id, so the artifact is self-contained. Bare `require`
//! names are external and resolved by the interpreter at load time.
//!
//! # Artifact layout
//!
//! ```text
//! -- appconf bundle of app.config.lua
//! -- modules: ./lib/paths
//! package.preload["./lib/paths"] = function(...)
//! <lib/paths.lua>
//! end
//! return (function(...)
//! <app.config.lua>
//! end)(...)
//! ```

use mlua::Lua;
use regex::{Captures, Regex};
use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{ConfigError, ScriptDiagnostic};

/// Suffix appended to the entry file name to form the artifact path.
pub const ARTIFACT_SUFFIX: &str = ".temporary.compiled.lua";

/// A successfully written artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    /// Path of the bundled artifact on disk
    pub artifact: PathBuf,
    /// Ids of the bundled local modules, in bundle order
    pub modules: Vec<String>,
    /// Every source file that went into the bundle, entry first
    pub inputs: Vec<PathBuf>,
}

/// Compiles one entry script into a self-contained artifact.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    entry: PathBuf,
}

impl ScriptCompiler {
    /// Create a compiler for an entry script.
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self { entry: entry.into() }
    }

    /// The entry script path.
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Directory containing the entry script (the project root).
    pub fn entry_dir(&self) -> PathBuf {
        match self.entry.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Deterministic artifact path derived from the entry script name.
    pub fn artifact_path(&self) -> PathBuf {
        let name = self.entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.entry_dir().join(format!("{}{}", name, ARTIFACT_SUFFIX))
    }

    /// Bundle the entry script and write the artifact.
    ///
    /// On failure no artifact is left on disk.
    pub fn compile(&self) -> Result<CompiledScript, ConfigError> {
        let artifact = self.artifact_path();
        let result = self.bundle().and_then(|(text, modules, inputs)| {
            fs::write(&artifact, text).map_err(|e| ConfigError::Compile {
                entry: self.entry.clone(),
                diagnostics: vec![ScriptDiagnostic::new(&artifact, e.to_string())],
            })?;
            Ok(CompiledScript { artifact: artifact.clone(), modules, inputs })
        });
        if result.is_err() && artifact.exists() {
            let _ = fs::remove_file(&artifact);
        }
        result
    }

    fn bundle(&self) -> Result<(String, Vec<String>, Vec<PathBuf>), ConfigError> {
        let root = self.entry_dir();
        let root = root.canonicalize().unwrap_or(root);
        let entry = self.entry.canonicalize().map_err(|e| self.failure(vec![ScriptDiagnostic::new(&self.entry, e.to_string())]))?;

        let checker = Lua::new();
        let mut diagnostics = Vec::new();
        // canonical path -> module id (the entry has no id)
        let mut ids: HashMap<PathBuf, String> = HashMap::new();
        let mut sources: Vec<(Option<String>, PathBuf, String)> = Vec::new();
        let mut queue = VecDeque::from([entry.clone()]);
        let mut queued = vec![entry.clone()];

        while let Some(file) = queue.pop_front() {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(e) => {
                    diagnostics.push(ScriptDiagnostic::new(&file, e.to_string()));
                    continue;
                }
            };

            if let Err(e) = checker.load(source.as_str()).set_name(format!("@{}", file.display())).into_function() {
                diagnostics.push(syntax_diagnostic(&file, &e.to_string()));
            }

            let base = file.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            let literals = literal_spans(&source);
            let mut rewrite_error = None;
            let rewritten = require_pattern().replace_all(&source, |caps: &Captures| {
                let start = caps.get(0).map_or(0, |m| m.start());
                if literals.iter().any(|span| span.contains(&start)) {
                    return caps[0].to_string();
                }
                let spec = caps.name("dq").or_else(|| caps.name("sq")).map_or("", |m| m.as_str());
                let problem = match resolve_local(&base, spec) {
                    Some(target) if target == entry => format!("local import '{}' requires the entry script", spec),
                    Some(target) => {
                        let id = ids.entry(target.clone()).or_insert_with(|| module_id(&root, &target)).clone();
                        if !queued.contains(&target) {
                            queued.push(target.clone());
                            queue.push_back(target);
                        }
                        return format!("require({:?})", id);
                    }
                    None => format!("cannot resolve local import '{}'", spec),
                };
                rewrite_error.get_or_insert_with(Vec::new).push(ScriptDiagnostic::with_line(
                    &file,
                    line_of(&source, start),
                    problem,
                ));
                caps[0].to_string()
            });
            let rewritten = rewritten.into_owned();
            if let Some(errors) = rewrite_error {
                diagnostics.extend(errors);
            }

            let id = if file == entry { None } else { ids.get(&file).cloned() };
            sources.push((id, file, rewritten));
        }

        if !diagnostics.is_empty() {
            return Err(self.failure(diagnostics));
        }

        let entry_name = self.entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let modules: Vec<String> = sources.iter().filter_map(|(id, _, _)| id.clone()).collect();
        let mut text = format!("-- appconf bundle of {}\n-- modules: {}\n", entry_name, modules.join(","));
        let mut entry_body = String::new();
        for (id, _, source) in &sources {
            match id {
                Some(id) => {
                    text.push_str(&format!("package.preload[{:?}] = function(...)\n{}\nend\n", id, source));
                }
                None => entry_body = source.clone(),
            }
        }
        text.push_str(&format!("return (function(...)\n{}\nend)(...)\n", entry_body));

        let inputs = sources.into_iter().map(|(_, path, _)| path).collect();
        Ok((text, modules, inputs))
    }

    fn failure(&self, diagnostics: Vec<ScriptDiagnostic>) -> ConfigError {
        ConfigError::Compile { entry: self.entry.clone(), diagnostics }
    }
}

fn require_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\brequire\s*(?:\(\s*)?(?:"(?P<dq>\.\.?/[^"]*)"|'(?P<sq>\.\.?/[^']*)')(?:\s*\))?"#)
            .expect("static pattern is valid")
    })
}

/// Byte ranges of comments and string literals, where `require` is not a call.
fn literal_spans(source: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i += 2;
                i = match long_bracket(bytes, i) {
                    Some(level) => close_long_bracket(bytes, i, level),
                    None => bytes[i..].iter().position(|&b| b == b'\n').map_or(bytes.len(), |p| i + p),
                };
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i = (i + 1).min(bytes.len());
            }
            b'[' => match long_bracket(bytes, i) {
                Some(level) => i = close_long_bracket(bytes, i, level),
                None => {
                    i += 1;
                    continue;
                }
            },
            _ => {
                i += 1;
                continue;
            }
        }
        spans.push(start..i);
    }
    spans
}

/// Level of a long bracket opening (`[[`, `[=[`, ...) at `at`.
fn long_bracket(bytes: &[u8], at: usize) -> Option<usize> {
    if bytes.get(at) != Some(&b'[') {
        return None;
    }
    let level = bytes[at + 1..].iter().take_while(|&&b| b == b'=').count();
    (bytes.get(at + 1 + level) == Some(&b'[')).then_some(level)
}

/// Offset just past the close of a long bracket opened at `at`; end of input if unclosed.
fn close_long_bracket(bytes: &[u8], at: usize, level: usize) -> usize {
    let close: Vec<u8> = std::iter::once(b']').chain(std::iter::repeat(b'=').take(level)).chain(std::iter::once(b']')).collect();
    let body = at + level + 2;
    bytes[body..].windows(close.len()).position(|w| w == close.as_slice()).map_or(bytes.len(), |p| body + p + close.len())
}

/// Resolve a relative specifier against the requiring file's directory.
///
/// Tries `<spec>.lua`, `<spec>` and `<spec>/init.lua`, in that order.
fn resolve_local(base: &Path, spec: &str) -> Option<PathBuf> {
    let joined = normalize_path(&base.join(spec));
    let mut with_ext = joined.clone().into_os_string();
    with_ext.push(".lua");
    [PathBuf::from(with_ext), joined.clone(), joined.join("init.lua")]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(|found| found.canonicalize().unwrap_or(found))
}

/// Stable module id: `./`-relative to the project root, without extension.
fn module_id(root: &Path, target: &Path) -> String {
    let stem = target.with_extension("");
    match stem.strip_prefix(root) {
        Ok(relative) => {
            let parts: Vec<String> = relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
            format!("./{}", parts.join("/"))
        }
        Err(_) => stem.to_string_lossy().into_owned(),
    }
}

/// Lexically collapse `.` and `..` components.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

/// Turn an interpreter syntax error (`path:LINE: message`) into a diagnostic.
fn syntax_diagnostic(file: &Path, message: &str) -> ScriptDiagnostic {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let line = LINE.get_or_init(|| Regex::new(r":(\d+):\s*(.*)").expect("static pattern is valid"));
    match line.captures(message) {
        Some(caps) => {
            let number = caps[1].parse().unwrap_or(0);
            let text = caps[2].lines().next().unwrap_or("").to_string();
            ScriptDiagnostic::with_line(file, number, text)
        }
        None => ScriptDiagnostic::new(file, message.lines().next().unwrap_or(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_artifact_path_is_deterministic() {
        let compiler = ScriptCompiler::new("/project/app.config.lua");
        assert_eq!(compiler.artifact_path(), PathBuf::from("/project/app.config.lua.temporary.compiled.lua"));
        assert_eq!(compiler.artifact_path(), ScriptCompiler::new("/project/app.config.lua").artifact_path());
    }

    #[test]
    fn test_artifact_path_bare_file_name() {
        let compiler = ScriptCompiler::new("app.config.lua");
        assert_eq!(compiler.artifact_path(), PathBuf::from("./app.config.lua.temporary.compiled.lua"));
    }

    #[test]
    fn test_compile_single_file() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "app.config.lua", "return function(ctx) return {} end\n");

        let compiled = ScriptCompiler::new(&entry).compile().unwrap();
        assert!(compiled.artifact.exists());
        assert!(compiled.modules.is_empty());
        assert_eq!(compiled.inputs.len(), 1);

        let text = fs::read_to_string(&compiled.artifact).unwrap();
        assert!(text.starts_with("-- appconf bundle of app.config.lua"));
        assert!(text.contains("return function(ctx) return {} end"));
    }

    #[test]
    fn test_compile_inlines_local_imports() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "lib/paths.lua", "local shared = require('../shared')\nreturn { out = shared.out }\n");
        write(temp.path(), "shared.lua", "return { out = 'dist' }\n");
        let entry = write(
            temp.path(),
            "app.config.lua",
            "local paths = require(\"./lib/paths\")\nlocal json = require(\"json\")\nreturn function() return { build = { distDir = paths.out } } end\n",
        );

        let compiled = ScriptCompiler::new(&entry).compile().unwrap();
        assert_eq!(compiled.modules, vec!["./lib/paths".to_string(), "./shared".to_string()]);
        assert_eq!(compiled.inputs.len(), 3);

        let text = fs::read_to_string(&compiled.artifact).unwrap();
        assert!(text.contains("package.preload[\"./lib/paths\"] = function(...)"));
        assert!(text.contains("package.preload[\"./shared\"] = function(...)"));
        assert!(text.contains("require(\"./shared\")"));
        // external imports are left alone
        assert!(text.contains("require(\"json\")"));
    }

    #[test]
    fn test_compile_shared_import_bundled_once() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.lua", "return require('./c')\n");
        write(temp.path(), "b.lua", "return require('./c')\n");
        write(temp.path(), "c.lua", "return 1\n");
        let entry = write(temp.path(), "app.config.lua", "require('./a') require('./b') return function() return {} end\n");

        let compiled = ScriptCompiler::new(&entry).compile().unwrap();
        assert_eq!(compiled.modules, vec!["./a", "./b", "./c"]);
    }

    #[test]
    fn test_compile_missing_import_fails_without_artifact() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "app.config.lua", "local x = require('./missing')\nreturn function() return {} end\n");

        let compiler = ScriptCompiler::new(&entry);
        let err = compiler.compile().unwrap_err();
        match err {
            ConfigError::Compile { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].line, Some(1));
                assert!(diagnostics[0].message.contains("./missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!compiler.artifact_path().exists());
    }

    #[test]
    fn test_commented_import_is_ignored() {
        let temp = TempDir::new().unwrap();
        let entry = write(
            temp.path(),
            "app.config.lua",
            "-- local old = require('./removed')\n--[[ require(\"./gone\") ]]\nlocal note = \"require('./nope')\"\nreturn function() return {} end\n",
        );

        let compiled = ScriptCompiler::new(&entry).compile().unwrap();
        assert!(compiled.modules.is_empty());
        let text = fs::read_to_string(&compiled.artifact).unwrap();
        assert!(text.contains("-- local old = require('./removed')"));
    }

    #[test]
    fn test_import_after_comment_still_bundled() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "paths.lua", "return {}\n");
        let entry = write(
            temp.path(),
            "app.config.lua",
            "--[==[ old ]] still a comment ]==] local p = require('./paths') -- trailing\nreturn function() return {} end\n",
        );

        let compiled = ScriptCompiler::new(&entry).compile().unwrap();
        assert_eq!(compiled.modules, vec!["./paths"]);
    }

    #[test]
    fn test_literal_spans() {
        let source = "a = 'x\\'y' -- c\nb = [[s]]";
        let spans = literal_spans(source);
        assert_eq!(spans, vec![4..10, 11..15, 20..25]);
    }

    #[test]
    fn test_import_of_entry_is_diagnosed() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "lib/back.lua", "return require('../app.config')\n");
        let entry = write(temp.path(), "app.config.lua", "local back = require('./lib/back')\nreturn function() return {} end\n");

        let compiler = ScriptCompiler::new(&entry);
        match compiler.compile().unwrap_err() {
            ConfigError::Compile { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), 1);
                assert!(diagnostics[0].file.ends_with("back.lua"));
                assert!(diagnostics[0].message.contains("requires the entry script"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!compiler.artifact_path().exists());
    }

    #[test]
    fn test_compile_syntax_error_reports_line() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "app.config.lua", "return function()\n  return {\nend\n");

        let compiler = ScriptCompiler::new(&entry);
        let err = compiler.compile().unwrap_err();
        match err {
            ConfigError::Compile { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), 1);
                assert!(diagnostics[0].line.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!compiler.artifact_path().exists());
    }

    #[test]
    fn test_compile_removes_stale_artifact_on_failure() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "app.config.lua", "return function(\n");
        let compiler = ScriptCompiler::new(&entry);
        fs::write(compiler.artifact_path(), "stale").unwrap();

        assert!(compiler.compile().is_err());
        assert!(!compiler.artifact_path().exists());
    }

    #[test]
    fn test_module_id_outside_root_uses_absolute_path() {
        let id = module_id(Path::new("/project"), Path::new("/elsewhere/util.lua"));
        assert_eq!(id, "/elsewhere/util");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d.lua")), PathBuf::from("/a/c/d.lua"));
    }
}
