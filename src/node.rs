use std::path::Path;
use std::sync::{Arc, LazyLock};

use napi::bindgen_prelude::*;
use napi_derive::napi;

use crate::config::Settings;
use crate::sign_video::publish::PublicationRegistry;
use crate::sign_video::translator::Translator;

static REGISTRY: LazyLock<Arc<PublicationRegistry>> =
    LazyLock::new(|| Arc::new(PublicationRegistry::new()));

#[napi(object)]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JsPublication {
    pub session: Option<String>,
    pub path: String,
    pub tier: String,
    pub segments: u32,
    pub skipped: Vec<String>,
    /// `false` when the failure came from the request text itself.
    pub ok: bool,
    pub message: Option<String>,
}

fn translator(config_path: Option<String>) -> Result<Translator> {
    let settings = match config_path {
        Some(path) => Settings::load(Path::new(&path)),
        None => Ok(Settings::default()),
    }
    .map_err(|e| Error::from_reason(e.to_string()))?
    .with_env();

    Ok(Translator::with_registry(&settings, Arc::clone(&REGISTRY)))
}

/// Generate an ISL video for `text`.
///
/// Empty or untranslatable text resolves with `ok: false` and a message the
/// page can show; internal failures reject.
#[napi]
pub fn generate_isl_video(
    text: String,
    config_path: Option<String>,
    session: Option<String>,
) -> Result<JsPublication> {
    let translator = translator(config_path)?;

    match translator.translate(&text, session.as_deref()) {
        Ok(publication) => Ok(JsPublication {
            session: publication.session,
            path: publication.path.to_string_lossy().into_owned(),
            tier: format!("{:?}", publication.plan.tier).to_lowercase(),
            segments: u32::try_from(publication.plan.segments.len()).unwrap_or(u32::MAX),
            skipped: publication
                .skipped
                .iter()
                .map(|s| format!("{}: {}", s.path.display(), s.reason))
                .collect(),
            ok: true,
            message: None,
        }),
        Err(e) if e.is_user_facing() => Ok(JsPublication {
            session,
            path: String::new(),
            tier: String::new(),
            segments: 0,
            skipped: Vec::new(),
            ok: false,
            message: Some(e.to_string()),
        }),
        Err(e) => Err(Error::from_reason(e.to_string())),
    }
}

/// Assembly plan for `text` as JSON, without rendering anything.
#[napi]
pub fn plan_isl_video(text: String, config_path: Option<String>) -> Result<String> {
    let plan = translator(config_path)?
        .plan(&text)
        .map_err(|e| Error::from_reason(e.to_string()))?;
    serde_json::to_string(&plan).map_err(|e| Error::from_reason(e.to_string()))
}

/// Path of the latest video for `session`, or the latest overall.
#[napi]
pub fn latest_isl_video(session: Option<String>) -> Option<String> {
    let path = match session {
        Some(session) => REGISTRY.latest_for(&session),
        None => REGISTRY.latest(),
    };
    path.map(|p| p.to_string_lossy().into_owned())
}
