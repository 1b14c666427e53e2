// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Export entry point.
//!
//! The [`Exporter`] owns the configuration, both registries, and one
//! [`Crosswalk`] per configured profile. Every template is loaded and
//! validated when the exporter is built, so a broken profile is reported up
//! front instead of halfway through an export.

use crate::{
    condition::ConditionRegistry,
    config::{ConfigError, CrosswalkConfig, ProfileDefinition, ProfileKind},
    crosswalk::{
        Crosswalk, CrosswalkError, CsvCrosswalk, DocumentCrosswalk, ReferCrosswalk, TabularTemplate,
        XlsCrosswalk,
    },
    interpret::Environment,
    path::resolve_template_path,
    record::MetadataRecord,
    relation::RelationResolver,
    store::RecordSource,
    template::{Template, TemplateError},
    virtual_field::VirtualFieldRegistry,
};

use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Exported content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// MIME type of content.
    pub mime_type: String,

    /// Suggested file name of content.
    pub file_name: String,

    /// Serialized records.
    pub content: Vec<u8>,
}

/// Profile based record exporter.
pub struct Exporter {
    config: CrosswalkConfig,
    virtuals: VirtualFieldRegistry,
    conditions: ConditionRegistry,
    crosswalks: BTreeMap<String, Box<dyn Crosswalk>>,
}

impl Exporter {
    /// Build exporter from configuration file.
    ///
    /// Relative template paths are resolved against the configured template
    /// directory, or the directory of the configuration file without one.
    ///
    /// # Errors
    ///
    /// - Return [`ExportError::ReadConfig`] if the file cannot be read.
    /// - Return [`ExportError::Config`] if the configuration is invalid.
    /// - Return [`ExportError::Template`] if any template fails to load.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: CrosswalkConfig = read_to_string(path)
            .map_err(|err| ExportError::ReadConfig {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Self::new(config, base_dir)
    }

    /// Build exporter with built-in virtual fields and conditions.
    ///
    /// # Errors
    ///
    /// - Return [`ExportError::Template`] if any template fails to load.
    pub fn new(config: CrosswalkConfig, base_dir: &Path) -> Result<Self> {
        let virtuals = VirtualFieldRegistry::with_defaults(&config);
        let conditions = ConditionRegistry::with_defaults();
        Self::with_registries(config, base_dir, virtuals, conditions)
    }

    /// Build exporter with custom registries.
    ///
    /// # Errors
    ///
    /// - Return [`ExportError::Template`] if any template fails to load.
    #[instrument(skip_all, level = "debug")]
    pub fn with_registries(
        config: CrosswalkConfig,
        base_dir: &Path,
        virtuals: VirtualFieldRegistry,
        conditions: ConditionRegistry,
    ) -> Result<Self> {
        let template_dir = match &config.template_dir {
            Some(template_dir) => resolve_template_path(base_dir, template_dir),
            None => base_dir.to_path_buf(),
        };

        let mut crosswalks = BTreeMap::new();
        for profile in &config.profiles {
            let crosswalk = build_crosswalk(profile, &config, &template_dir, &virtuals, &conditions)
                .map_err(|err| ExportError::Template {
                    profile: profile.name.clone(),
                    source: err,
                })?;
            crosswalks.insert(profile.name.clone(), crosswalk);
        }
        info!("loaded {} export profiles", crosswalks.len());

        Ok(Self {
            config,
            virtuals,
            conditions,
            crosswalks,
        })
    }

    pub fn config(&self) -> &CrosswalkConfig {
        &self.config
    }

    /// All profiles in configuration order.
    pub fn profiles(&self) -> impl Iterator<Item = &ProfileDefinition> {
        self.config.profiles.iter()
    }

    /// Find crosswalk of profile.
    ///
    /// # Errors
    ///
    /// - Return [`ExportError::UnknownProfile`] if profile does not exist.
    pub fn crosswalk(&self, profile: &str) -> Result<&dyn Crosswalk> {
        self.crosswalks
            .get(profile)
            .map(|crosswalk| &**crosswalk)
            .ok_or_else(|| ExportError::UnknownProfile(profile.to_string()))
    }

    /// Export subjects through profile.
    ///
    /// A single subject is serialized on its own. Several subjects are
    /// serialized together, e.g., wrapped in a JSON array or as table rows.
    /// Relation groups need a record source to find related records, and
    /// render nothing without one.
    ///
    /// # Errors
    ///
    /// - Return [`ExportError::UnknownProfile`] if profile does not exist.
    /// - Return [`ExportError::Crosswalk`] if serialization fails, or the
    ///   profile cannot export a subject.
    #[instrument(skip(self, subjects, source), fields(subjects = subjects.len()))]
    pub fn export(
        &self,
        profile: &str,
        subjects: &[MetadataRecord],
        source: Option<&dyn RecordSource>,
    ) -> Result<Export> {
        let crosswalk = self.crosswalk(profile)?;
        let env = Environment {
            virtuals: &self.virtuals,
            conditions: &self.conditions,
            relations: RelationResolver::new(&self.config.relations, source),
        };

        let content = match subjects {
            [subject] => crosswalk.disseminate_one(env, subject)?,
            subjects => crosswalk.disseminate_all(env, subjects)?,
        };
        let definition = crosswalk.profile();

        Ok(Export {
            mime_type: definition.mime_type().to_string(),
            file_name: definition.file_name(),
            content,
        })
    }
}

impl Debug for Exporter {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Exporter")
            .field("virtuals", &self.virtuals)
            .field("conditions", &self.conditions)
            .field("profiles", &self.crosswalks.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_crosswalk(
    profile: &ProfileDefinition,
    config: &CrosswalkConfig,
    template_dir: &Path,
    virtuals: &VirtualFieldRegistry,
    conditions: &ConditionRegistry,
) -> std::result::Result<Box<dyn Crosswalk>, TemplateError> {
    let path = resolve_template_path(template_dir, &profile.template);
    let separators = profile.separators(&config.separators);

    let crosswalk: Box<dyn Crosswalk> = match profile.kind {
        ProfileKind::Refer => Box::new(ReferCrosswalk::new(
            profile.clone(),
            Template::load(&path, virtuals, conditions)?,
        )),
        ProfileKind::Pdf => Box::new(DocumentCrosswalk::new(
            profile.clone(),
            Template::load(&path, virtuals, conditions)?,
        )),
        ProfileKind::Csv => Box::new(CsvCrosswalk::new(
            profile.clone(),
            TabularTemplate::load(&path, virtuals)?,
            separators,
        )),
        ProfileKind::Xls => Box::new(XlsCrosswalk::new(
            profile.clone(),
            TabularTemplate::load(&path, virtuals)?,
            separators,
        )),
    };

    Ok(crosswalk)
}

/// Exporter error types.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Configuration file cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Template of profile failed to load.
    #[error("profile {profile:?} has an invalid template")]
    Template {
        profile: String,
        #[source]
        source: TemplateError,
    },

    /// Profile does not exist.
    #[error("profile {0:?} is not configured")]
    UnknownProfile(String),

    /// Serialization failed.
    #[error(transparent)]
    Crosswalk(#[from] CrosswalkError),
}

/// Friendly result alias :3
pub type Result<T, E = ExportError> = std::result::Result<T, E>;
