//! Environment tables: the global define table and `.env` file resolution.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{merge, Context, ValueExt};
use crate::error::ConfigError;

/// What to resolve env files for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRequest {
    /// Mode name (`spa`, `ssr`, ...)
    pub mode: String,
    /// `dev` or `prod`
    pub build_type: String,
    /// Folder holding the env files
    pub env_folder: PathBuf,
    /// Extra env files, relative to `env_folder`, loaded last
    pub env_files: Vec<String>,
}

/// Resolves `.env`-style files into one key/value table.
#[async_trait(?Send)]
pub trait EnvResolver {
    async fn resolve(&self, request: &EnvRequest) -> Result<BTreeMap<String, String>, ConfigError>;
}

/// Reads dotenv files in precedence order; later files win.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotenvResolver;

impl DotenvResolver {
    /// File names consulted for a request, lowest precedence first.
    pub fn file_names(request: &EnvRequest) -> Vec<String> {
        let mode = &request.mode;
        let build = &request.build_type;
        let mut names = vec![
            ".env".to_string(),
            ".env.local".to_string(),
            format!(".env.{mode}"),
            format!(".env.{mode}.local"),
            format!(".env.{build}"),
            format!(".env.{build}.local"),
            format!(".env.{mode}.{build}"),
            format!(".env.{mode}.{build}.local"),
        ];
        names.extend(request.env_files.iter().cloned());
        names
    }
}

#[async_trait(?Send)]
impl EnvResolver for DotenvResolver {
    async fn resolve(&self, request: &EnvRequest) -> Result<BTreeMap<String, String>, ConfigError> {
        let mut table = BTreeMap::new();
        for name in Self::file_names(request) {
            let path = request.env_folder.join(&name);
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::Env(format!("{}: {}", path.display(), e))),
            };
            tracing::debug!("Loaded env file {}", path.display());
            table.extend(parse_dotenv(&contents));
        }
        Ok(table)
    }
}

/// Parse `KEY=VALUE` lines; supports `export ` prefixes, `#` comments and quotes.
pub fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), unquote(raw.trim())));
    }
    pairs
}

fn unquote(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return if quote == '"' { inner.replace("\\n", "\n") } else { inner.to_string() };
        }
    }
    // unquoted values end at an inline comment
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// Build the global define table and merge the user's raw defines over it.
pub fn apply_raw_define(cfg: &mut Value, ctx: &Context) {
    let mut table = Map::new();
    let mut define = |key: &str, value: Value| {
        table.insert(format!("process.env.{key}"), value);
    };
    define("MODE", json!(ctx.mode_name.as_str()));
    define("DEV", json!(ctx.dev));
    define("PROD", json!(ctx.prod));
    define("DEBUGGING", json!(cfg.bool_at("__meta.debugging").unwrap_or(false)));
    define("VUE_ROUTER_MODE", json!(cfg.str_at("build.vueRouterMode").unwrap_or_default()));
    define("VUE_ROUTER_BASE", json!(cfg.str_at("build.vueRouterBase").unwrap_or_default()));
    if let Some(url) = cfg.str_at("__meta.appUrl") {
        define("APP_URL", json!(url));
    }
    if let Some(env) = cfg.at("build.env").and_then(Value::as_object) {
        for (key, value) in env {
            define(key, value.clone());
        }
    }

    let mut defines = Value::Object(table);
    let user = cfg.remove_at("build.rawDefine").unwrap_or(Value::Null);
    merge(&mut defines, user);
    cfg.set_at("build.rawDefine", defines);
}

/// The resolver request for this configuration.
pub fn env_request(cfg: &Value, ctx: &Context, project_root: &Path) -> EnvRequest {
    let env_folder = match cfg.text_at("build.envFolder") {
        Some(folder) => project_root.join(folder),
        None => project_root.to_path_buf(),
    };
    let env_files = cfg
        .at("build.envFiles")
        .and_then(Value::as_array)
        .map(|files| files.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    EnvRequest {
        mode: ctx.mode_name.as_str().to_string(),
        build_type: ctx.build_type().to_string(),
        env_folder,
        env_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeName;
    use std::fs;
    use tempfile::TempDir;

    fn request(folder: &Path) -> EnvRequest {
        EnvRequest {
            mode: "spa".into(),
            build_type: "dev".into(),
            env_folder: folder.to_path_buf(),
            env_files: vec![],
        }
    }

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv(
            "# comment\nA=1\nexport B = two \nC=\"quoted # not comment\"\nD='single'\nE=x # trailing\nbroken\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "quoted # not comment".to_string()),
                ("D".to_string(), "single".to_string()),
                ("E".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_file_names_order() {
        let mut req = request(Path::new("/p"));
        req.env_files = vec!["custom.env".into()];
        let names = DotenvResolver::file_names(&req);
        assert_eq!(names.first().map(String::as_str), Some(".env"));
        assert_eq!(names[6], ".env.spa.dev");
        assert_eq!(names.last().map(String::as_str), Some("custom.env"));
    }

    #[tokio::test]
    async fn test_dotenv_precedence() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".env"), "A=base\nB=base\n").unwrap();
        fs::write(temp.path().join(".env.dev"), "B=dev\n").unwrap();
        fs::write(temp.path().join(".env.spa.dev.local"), "C=local\n").unwrap();

        let table = DotenvResolver.resolve(&request(temp.path())).await.unwrap();
        assert_eq!(table.get("A").map(String::as_str), Some("base"));
        assert_eq!(table.get("B").map(String::as_str), Some("dev"));
        assert_eq!(table.get("C").map(String::as_str), Some("local"));
    }

    #[tokio::test]
    async fn test_dotenv_missing_folder_is_empty() {
        let temp = TempDir::new().unwrap();
        let table = DotenvResolver.resolve(&request(&temp.path().join("nope"))).await.unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_raw_define_user_wins() {
        let ctx = Context::dev(ModeName::Spa);
        let mut cfg = json!({
            "__meta": { "debugging": true, "appUrl": "http://localhost:8080/" },
            "build": {
                "vueRouterMode": "hash",
                "vueRouterBase": "/",
                "env": { "API": "https://api" },
                "rawDefine": { "process.env.DEV": "override" }
            }
        });
        apply_raw_define(&mut cfg, &ctx);

        let defines = &cfg["build"]["rawDefine"];
        assert_eq!(defines["process.env.MODE"], json!("spa"));
        assert_eq!(defines["process.env.DEV"], json!("override"));
        assert_eq!(defines["process.env.PROD"], json!(false));
        assert_eq!(defines["process.env.DEBUGGING"], json!(true));
        assert_eq!(defines["process.env.APP_URL"], json!("http://localhost:8080/"));
        assert_eq!(defines["process.env.API"], json!("https://api"));
    }

    #[test]
    fn test_env_request_uses_folder() {
        let ctx = Context::prod(ModeName::Pwa);
        let cfg = json!({ "build": { "envFolder": "envs", "envFiles": ["extra.env"] } });
        let req = env_request(&cfg, &ctx, Path::new("/p"));
        assert_eq!(req.env_folder, PathBuf::from("/p/envs"));
        assert_eq!(req.build_type, "prod");
        assert_eq!(req.mode, "pwa");
        assert_eq!(req.env_files, vec!["extra.env".to_string()]);
    }
}
