//! Configuration loading and validation.
//!
//! Sources are merged lowest to highest precedence:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. The config file: YAML, or TOML/JSON by extension.
//! 3. `CDMAN_*` environment variables, `__` separating nested keys.
//!
//! Command-line overrides are applied by the caller on top of the result.

mod disc;
pub mod error;

pub use crate::disc::{
    AudioDefinition, DiscDefinition, DiscEntry, FolderDefinition, Mp3Definition, Source, Sources,
};
use crate::error::{ErrorKind, Result};
use cdman_library::{OnUnexpected, PopulateMode};
use directories::{BaseDirs, ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CDMAN_CONFIG";
const ENV_PREFIX: &str = "CDMAN_";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per disc.
    pub path: PathBuf,
    /// Worker threads for filesystem and transcoding work.
    pub threads: usize,
    /// Default MP3 bitrate in kbps.
    pub bitrate: u32,
    /// Default population mode for audio discs.
    pub population_mode: PopulateMode,
    pub dry: bool,
    pub on_unexpected: OnUnexpected,
    /// beets library database; beets' own configuration decides when unset.
    pub beets_library: Option<PathBuf>,
    /// Disc definitions keyed by disc name.
    pub cds: BTreeMap<String, Value>,
    /// Extra disc definition files, or directories of `.yml`/`.yaml` files.
    pub cd_files: Vec<PathBuf>,
    /// Directory of the loaded config file.
    #[serde(skip)]
    pub source_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let music = UserDirs::new()
            .and_then(|d| d.audio_dir().map(Path::to_path_buf))
            .or_else(|| BaseDirs::new().map(|d| d.home_dir().join("Music")))
            .unwrap_or_else(|| PathBuf::from("Music"));
        Self {
            path: music.join("CDs"),
            threads: 8,
            bitrate: 128,
            population_mode: PopulateMode::default(),
            dry: false,
            on_unexpected: OnUnexpected::default(),
            beets_library: None,
            cds: BTreeMap::new(),
            cd_files: Vec::new(),
            source_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// `<config dir>/cdman/config.yml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cdman").map(|d| d.config_dir().join("config.yml"))
    }

    /// The explicit path, else `$CDMAN_CONFIG`, else [`Config::default_path`].
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path)
    }

    /// Every configuration source, merged in precedence order.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Yaml::file(file)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    ///
    /// A missing file at the default location is fine; a missing file that
    /// was asked for explicitly is not.
    ///
    /// # Errors
    /// - [`ErrorKind::Load`] if a source cannot be parsed or a value has the
    ///   wrong type.
    /// - [`ErrorKind::Invalid`] if a value is out of range.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = Self::resolve_path(explicit);
        if let Some(explicit) = explicit
            && !explicit.exists()
        {
            exn::bail!(ErrorKind::Invalid("config", format!("{} does not exist", explicit.display())));
        }
        match &file {
            Some(file) if file.exists() => tracing::debug!(path = %file.display(), "Loading configuration"),
            _ => tracing::debug!("No configuration file; using defaults and environment"),
        }

        let mut config: Config = Self::figment(file.as_deref()).extract().or_raise(|| ErrorKind::Load)?;
        config.source_dir = match file.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf()),
            _ => std::env::current_dir().unwrap_or_default(),
        };
        config.path = expand_home(&config.path);
        config.beets_library = config.beets_library.as_deref().map(expand_home);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            exn::bail!(ErrorKind::Invalid("threads", "must be at least 1".to_string()));
        }
        if self.bitrate == 0 {
            exn::bail!(ErrorKind::Invalid("bitrate", "must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Every disc definition that parses, from `cds` and then from
    /// `cd_files`. Invalid definitions and unreadable files are logged and
    /// skipped; a later definition replaces an earlier one of the same name.
    pub fn discs(&self) -> Vec<DiscEntry> {
        let mut entries: BTreeMap<String, DiscEntry> = BTreeMap::new();
        let mut add = |name: &str, base: &Path, value: &Value| match parse_disc(name, value) {
            Ok(definition) => {
                let entry = DiscEntry { name: name.to_string(), base: base.to_path_buf(), definition };
                if entries.insert(name.to_string(), entry).is_some() {
                    tracing::warn!(disc = name, "Disc defined more than once; using the last definition");
                }
            },
            Err(e) => tracing::warn!(disc = name, error = ?e, "Skipping invalid disc definition"),
        };

        for (name, value) in &self.cds {
            add(name, &self.source_dir, value);
        }
        for file in self.disc_files() {
            match read_disc_file(&file) {
                Ok(discs) => {
                    let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
                    for (name, value) in &discs {
                        add(name, &base, value);
                    }
                },
                Err(e) => tracing::warn!(path = %file.display(), error = ?e, "Skipping disc definition file"),
            }
        }
        entries.into_values().collect()
    }

    /// `cd_files` expanded: directories contribute their `.yml`/`.yaml`
    /// files in name order.
    fn disc_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in &self.cd_files {
            let path = self.source_dir.join(expand_home(path));
            if !path.is_dir() {
                files.push(path);
                continue;
            }
            let Ok(entries) = fs::read_dir(&path) else {
                tracing::warn!(path = %path.display(), "Could not list disc definition directory");
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && matches!(p.extension().and_then(|e| e.to_str()), Some("yml" | "yaml")))
                .collect();
            found.sort();
            files.extend(found);
        }
        files
    }
}

fn parse_disc(name: &str, value: &Value) -> Result<DiscDefinition> {
    value.deserialize::<DiscDefinition>().or_raise(|| ErrorKind::Disc(name.to_string()))
}

fn read_disc_file(path: &Path) -> Result<BTreeMap<String, Value>> {
    if !path.is_file() {
        exn::bail!(ErrorKind::DiscFile(path.to_path_buf()));
    }
    Figment::from(Yaml::file(path)).extract().or_raise(|| ErrorKind::DiscFile(path.to_path_buf()))
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::ops::Deref;

    const CONFIG: &str = r#"
path: /srv/cds
threads: 4
bitrate: 192
population_mode: hard_link
on_unexpected: abort
cds:
  Road Trip:
    type: mp3
    bitrate: 256
    folders:
      - name: Rock
        query: "artist:'Led Zeppelin'"
      - name: __root__
        playlists: [road.m3u, /abs/trip.m3u8]
  Party:
    type: audio
    capacity: -1
    population_mode: soft_link
    tracks:
      - query: genre:Disco
      - playlist: party.m3u
  Broken:
    type: cassette
"#;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.threads, 8);
        assert_eq!(config.bitrate, 128);
        assert_eq!(config.population_mode, PopulateMode::Copy);
        assert_eq!(config.on_unexpected, OnUnexpected::Skip);
        assert!(config.path.ends_with("CDs"));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_yaml_and_discs() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yml", CONFIG)?;
            let config = Config::load(Some(Path::new("config.yml"))).unwrap();
            assert_eq!(config.path, PathBuf::from("/srv/cds"));
            assert_eq!(config.threads, 4);
            assert_eq!(config.bitrate, 192);
            assert_eq!(config.population_mode, PopulateMode::HardLink);
            assert_eq!(config.on_unexpected, OnUnexpected::Abort);

            let discs = config.discs();
            let names: Vec<&str> = discs.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, ["Party", "Road Trip"]);

            let DiscDefinition::Audio(party) = &discs[0].definition else { panic!("Party should be audio") };
            assert_eq!(party.capacity, Some(-1));
            assert_eq!(party.population_mode, Some(PopulateMode::SoftLink));
            assert_eq!(party.tracks.len(), 2);

            let DiscDefinition::Mp3(trip) = &discs[1].definition else { panic!("Road Trip should be mp3") };
            assert_eq!(trip.bitrate, Some(256));
            assert_eq!(trip.folders[0].name, "Rock");
            assert_eq!(trip.folders[0].sources.query.as_deref(), Some("artist:'Led Zeppelin'"));
            let root = trip.folders[1].sources.resolve(&discs[1].base);
            assert_eq!(
                root,
                [
                    Source::Playlist(jail.directory().join("road.m3u")),
                    Source::Playlist(PathBuf::from("/abs/trip.m3u8")),
                ]
            );
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yml", "bitrate: 192\nthreads: 4\n")?;
            jail.set_env("CDMAN_BITRATE", "320");
            jail.set_env("CDMAN_DRY", "true");
            let config = Config::load(Some(Path::new("config.yml"))).unwrap();
            assert_eq!(config.bitrate, 320);
            assert_eq!(config.threads, 4);
            assert!(config.dry);
            Ok(())
        });
    }

    #[test]
    fn test_toml_by_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "threads = 2\npopulation_mode = \"soft_link\"\n")?;
            let config = Config::load(Some(Path::new("config.toml"))).unwrap();
            assert_eq!(config.threads, 2);
            assert_eq!(config.population_mode, PopulateMode::SoftLink);
            Ok(())
        });
    }

    #[rstest]
    #[case::zero_threads(Some("threads: 0\n"), "invalid configuration value for `threads`")]
    #[case::unknown_mode(Some("population_mode: teleport\n"), "could not load configuration")]
    #[case::missing_file(None, "invalid configuration value for `config`")]
    fn test_invalid_values(#[case] content: Option<&str>, #[case] expected: &str) {
        Jail::expect_with(|jail| {
            if let Some(content) = content {
                jail.create_file("config.yml", content)?;
            }
            let err = Config::load(Some(Path::new("config.yml"))).unwrap_err();
            assert!(err.deref().to_string().starts_with(expected), "{err:?}");
            Ok(())
        });
    }

    #[test]
    fn test_disc_files() {
        Jail::expect_with(|jail| {
            jail.create_dir("discs")?;
            jail.create_file("discs/a.yml", "Alpha:\n  type: audio\n  tracks:\n    - playlist: alpha.m3u\n")?;
            jail.create_file("discs/b.yaml", "Bravo:\n  type: mp3\n")?;
            jail.create_file("discs/broken.yml", "this: [is not\n")?;
            jail.create_file("discs/notes.txt", "ignored")?;
            jail.create_file("extra.yml", "Charlie:\n  type: mp3\n")?;
            jail.create_file(
                "config.yml",
                "cd_files: [discs, extra.yml, missing.yml]\ncds:\n  Alpha:\n    type: mp3\n",
            )?;

            let config = Config::load(Some(Path::new("config.yml"))).unwrap();
            let discs = config.discs();
            let names: Vec<&str> = discs.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, ["Alpha", "Bravo", "Charlie"]);
            // The definition file wins over the inline one.
            assert!(matches!(discs[0].definition, DiscDefinition::Audio(_)));
            assert_eq!(discs[0].base, jail.directory().join("discs"));
            Ok(())
        });
    }

    #[test]
    fn test_expand_home() {
        let home = BaseDirs::new().unwrap().home_dir().to_path_buf();
        assert_eq!(expand_home(Path::new("~/Music")), home.join("Music"));
        assert_eq!(expand_home(Path::new("~")), home);
        assert_eq!(expand_home(Path::new("/abs/~")), PathBuf::from("/abs/~"));
        assert_eq!(expand_home(Path::new("~user/x")), PathBuf::from("~user/x"));
    }
}
