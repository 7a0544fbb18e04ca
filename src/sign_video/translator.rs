use std::path::PathBuf;
use std::sync::Arc;

use super::plan::CascadeEngine;
use super::publish::{PublicationRegistry, Publisher};
use super::{AssemblyPlan, SkippedAsset};
use crate::config::Settings;
use crate::error::IslResult;

/// Result of one text → sign video request
#[derive(Debug, Clone)]
pub struct Publication {
    /// Session the result was recorded under, if the caller named one.
    pub session: Option<String>,
    pub path: PathBuf,
    pub plan: AssemblyPlan,
    pub skipped: Vec<SkippedAsset>,
}

/// Text → ISL video front door: plans, publishes and remembers results per session.
#[derive(Debug)]
pub struct Translator {
    engine: CascadeEngine,
    publisher: Publisher,
    registry: Arc<PublicationRegistry>,
}

impl Translator {
    pub fn new(settings: &Settings) -> Self {
        Self::with_registry(settings, Arc::new(PublicationRegistry::new()))
    }

    /// Share one registry between translators, e.g. across config reloads.
    pub fn with_registry(settings: &Settings, registry: Arc<PublicationRegistry>) -> Self {
        Self {
            engine: CascadeEngine::from_settings(settings),
            publisher: Publisher::from_settings(settings),
            registry,
        }
    }

    pub fn plan(&self, text: &str) -> IslResult<AssemblyPlan> {
        self.engine.build_plan(text)
    }

    /// Build and publish a video for `text`.
    ///
    /// Without a session the result only becomes the registry's overall latest.
    pub fn translate(&self, text: &str, session: Option<&str>) -> IslResult<Publication> {
        let plan = self.engine.build_plan(text)?;
        let published = self.publisher.publish(&plan)?;
        self.registry.record(session, &published.path);

        Ok(Publication {
            session: session.map(str::to_string),
            path: published.path,
            plan,
            skipped: published.skipped,
        })
    }

    pub fn registry(&self) -> &Arc<PublicationRegistry> {
        &self.registry
    }
}
