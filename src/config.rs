use std::ffi::CStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ShellError;
use crate::history::DEFAULT_HISTORY_SIZE;

const CONFIG_FILE_NAME: &str = ".forksh_config";
const HISTORY_FILE_NAME: &str = ".forksh_history";

/// Settings read from `~/.forksh_config` (or `--config <path>`).
///
/// The file holds `key = value` lines; `#` starts a comment line.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: String,
    pub history_file: PathBuf,
    pub history_size: usize,
    pub welcome: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "forksh> ".to_string(),
            history_file: home_dir().join(HISTORY_FILE_NAME),
            history_size: DEFAULT_HISTORY_SIZE,
            welcome: true,
            debug: false,
        }
    }
}

impl Config {
    /// Load settings. An explicit path must exist; the default file is
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ShellError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (home_dir().join(CONFIG_FILE_NAME), false),
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "reading config");
                Self::parse(&text, &path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(source) => Err(ShellError::ConfigRead { path, source }),
        }
    }

    /// Parse config text on top of the defaults. `path` is only used in
    /// error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ShellError> {
        let mut config = Self::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let error = |message: String| ShellError::Config {
                path: path.to_path_buf(),
                line: index + 1,
                message,
            };

            let Some((key, value)) = line.split_once('=') else {
                return Err(error(format!("expected key = value, got '{line}'")));
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "prompt" => config.prompt = unquote(value).to_string(),
                "history_file" => config.history_file = expand_home(value),
                "history_size" => {
                    config.history_size = match value.parse::<usize>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            return Err(error(format!(
                                "history_size must be a positive integer, got '{value}'"
                            )));
                        }
                    }
                }
                "welcome" => {
                    config.welcome = parse_bool(value)
                        .ok_or_else(|| error(format!("welcome must be true or false, got '{value}'")))?
                }
                "debug" => {
                    config.debug = parse_bool(value)
                        .ok_or_else(|| error(format!("debug must be true or false, got '{value}'")))?
                }
                other => tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    "ignoring unknown config key '{other}'"
                ),
            }
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Strip one pair of surrounding double quotes so a prompt can end in a
/// space.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix('~') {
        Some(rest) => home_dir().join(rest.trim_start_matches('/')),
        None => PathBuf::from(value),
    }
}

/// `$HOME`, falling back to the passwd entry, then the current directory.
pub fn home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        return PathBuf::from(home);
    }

    // SAFETY: getpwuid returns a pointer into static storage or null; the
    // directory string is copied out before any other passwd call.
    unsafe {
        let entry = libc::getpwuid(libc::getuid());
        if !entry.is_null() && !(*entry).pw_dir.is_null() {
            let dir = CStr::from_ptr((*entry).pw_dir);
            return PathBuf::from(dir.to_string_lossy().into_owned());
        }
    }

    PathBuf::from(".")
}

/// What the command line asked for.
#[derive(Debug, PartialEq)]
pub enum Invocation {
    Run {
        debug: bool,
        config: Option<PathBuf>,
    },
    Help,
    Version,
}

/// Parse startup flags. `args` excludes the program name.
pub fn parse_args<I>(args: I) -> Result<Invocation, String>
where
    I: IntoIterator<Item = String>,
{
    let mut debug = false;
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-V" | "-v" | "--version" => return Ok(Invocation::Version),
            "-d" | "--debug" => debug = true,
            "-c" | "--config" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => return Err(format!("{arg} requires a file path")),
            },
            other => {
                if let Some(path) = other.strip_prefix("--config=") {
                    config = Some(PathBuf::from(path));
                } else {
                    return Err(format!(
                        "Unknown option: {other}\nUse --help for usage information"
                    ));
                }
            }
        }
    }

    Ok(Invocation::Run { debug, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_flags_runs_with_defaults() {
        assert_eq!(
            parse_args(args(&[])).unwrap(),
            Invocation::Run { debug: false, config: None }
        );
    }

    #[test]
    fn debug_and_config() {
        assert_eq!(
            parse_args(args(&["--debug", "--config", "/tmp/x"])).unwrap(),
            Invocation::Run { debug: true, config: Some(PathBuf::from("/tmp/x")) }
        );
        assert_eq!(
            parse_args(args(&["--config=/tmp/y"])).unwrap(),
            Invocation::Run { debug: false, config: Some(PathBuf::from("/tmp/y")) }
        );
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(parse_args(args(&["-d", "--help"])).unwrap(), Invocation::Help);
        assert_eq!(parse_args(args(&["--version"])).unwrap(), Invocation::Version);
    }

    #[test]
    fn config_without_path_is_error() {
        assert!(parse_args(args(&["--config"])).unwrap_err().contains("requires a file path"));
    }

    #[test]
    fn unknown_option_is_error() {
        assert!(parse_args(args(&["--bogus"])).unwrap_err().starts_with("Unknown option: --bogus"));
    }

    #[test]
    fn parse_overrides_defaults() {
        let text = "# comment\nprompt = \"$ \"\nhistory_size = 50\nwelcome = false\n\ndebug = yes\nhistory_file = /tmp/h\n";
        let config = Config::parse(text, Path::new("cfg")).unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.history_size, 50);
        assert!(!config.welcome);
        assert!(config.debug);
        assert_eq!(config.history_file, PathBuf::from("/tmp/h"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::parse("default_mode = linux\n", Path::new("cfg")).unwrap();
        assert_eq!(config.history_size, DEFAULT_HISTORY_SIZE);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = Config::parse("prompt = x\nnonsense\n", Path::new("cfg")).unwrap_err();
        assert_eq!(err.to_string(), "cfg:2: expected key = value, got 'nonsense'");
    }

    #[test]
    fn zero_history_size_is_rejected() {
        assert!(Config::parse("history_size = 0", Path::new("cfg")).is_err());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let missing = std::env::temp_dir().join("forksh_no_such_config_file");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ShellError::ConfigRead { .. })
        ));
    }

    #[test]
    fn tilde_expands_to_home() {
        assert_eq!(expand_home("~/h"), home_dir().join("h"));
        assert_eq!(expand_home("/abs"), PathBuf::from("/abs"));
    }
}
