use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::date::parse_timezone;

const CONFIG_ENV_VAR: &str =
  "ROAM_CONFIG";
const CONFIG_FILE: &str = "roam.toml";

/// Effective settings as flat dotted
/// keys (`data.location`,
/// `display.color`, ...).
#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_file: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.roam".to_string()
    );
    map.insert(
      "default.command".to_string(),
      "status".to_string()
    );
    map.insert(
      "display.color".to_string(),
      "true".to_string()
    );
    Self {
      map,
      loaded_file: None
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_config_path(
      config_override
    )? {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        cfg.load_file(&path)?;
      }
      | None => {
        warn!(
          "no config file found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// Parses TOML text on top of the
  /// current values.
  pub fn merge_toml(
    &mut self,
    text: &str
  ) -> anyhow::Result<()> {
    let table: toml::Table =
      toml::from_str(text)
        .context("invalid TOML")?;
    flatten_into(
      &mut self.map,
      "",
      &table
    );
    Ok(())
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Reads an on/off setting. Unknown
  /// spellings are an error rather than
  /// silently false.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      }
    )
  }

  /// Zone that decides what "today"
  /// is; `None` means the system zone.
  pub fn timezone(&self) -> Option<Tz> {
    self.map.get("time.timezone").and_then(
      |raw| {
        parse_timezone(
          raw,
          "config:time.timezone"
        )
      }
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self.merge_toml(&text).with_context(
      || {
        format!(
          "failed to parse {}",
          path.display()
        )
      }
    )?;
    self.loaded_file = Some(path);
    Ok(())
  }
}

fn flatten_into(
  map: &mut BTreeMap<String, String>,
  prefix: &str,
  table: &toml::Table
) {
  for (k, v) in table {
    let key = if prefix.is_empty() {
      k.clone()
    } else {
      format!("{prefix}.{k}")
    };

    match v {
      | toml::Value::Table(inner) => {
        flatten_into(map, &key, inner);
      }
      | toml::Value::String(s) => {
        trace!(key = %key, value = %s, "loaded config key");
        map.insert(key, s.clone());
      }
      | other => {
        trace!(key = %key, value = %other, "loaded config key");
        map.insert(
          key,
          other.to_string()
        );
      }
    }
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join("roam")
    .join(CONFIG_FILE);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".roam"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
