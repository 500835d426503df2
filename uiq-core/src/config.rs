//! Process-wide query configuration.
//!
//! The configuration is a plain [`Config`] value behind a `parking_lot`
//! lock.  [`crate::query::Queries`] takes a snapshot when it is built, so a
//! query object never observes a later `configure` call half-way through.
//!
//! # Host component names
//!
//! Several accessibility rules depend on knowing which concrete type tag the
//! renderer uses for text, editable fields, images, switches, scroll views and
//! modals.  These come from explicit configuration, or are detected once by
//! asking a registered [`HostProbe`] to render a probe tree.  The modal name
//! feeds [`crate::a11y::is_element_visible`]; the scroll view name is detected
//! and stored for renderer collaborators that drive scrolling, and no query
//! rule reads it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, Result};
use crate::tree::{find_all, Tree};

/// Default deadline for async queries.
pub const DEFAULT_ASYNC_UTIL_TIMEOUT: Duration = Duration::from_millis(1000);

const REMEDIATION: &str = "\
Host component names could not be determined. Supply them explicitly before running queries:

    uiq_core::config::configure(ConfigureOptions {
        host_component_names: Some(HostComponentNames {
            text: \"Text\".into(),
            text_input: \"TextInput\".into(),
            image: \"Image\".into(),
            switch: \"RCTSwitch\".into(),
            scroll_view: \"RCTScrollView\".into(),
            modal: \"Modal\".into(),
        }),
        ..Default::default()
    });";

static CONFIG: RwLock<Config> = RwLock::new(Config::DEFAULT);
static HOST_PROBE: RwLock<Option<Arc<dyn HostProbe>>> = RwLock::new(None);

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Renderer type tags for the semantic host kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostComponentNames {
    pub text: String,
    pub text_input: String,
    pub image: String,
    pub switch: String,
    pub scroll_view: String,
    pub modal: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub async_util_timeout: Duration,
    pub default_include_hidden_elements: bool,
    pub host_component_names: Option<HostComponentNames>,
}

impl Config {
    pub const DEFAULT: Config = Config {
        async_util_timeout: DEFAULT_ASYNC_UTIL_TIMEOUT,
        default_include_hidden_elements: false,
        host_component_names: None,
    };

    /// Merge `options` into this config.
    ///
    /// When both hidden-element options are set in the same call the
    /// canonical `default_include_hidden_elements` wins.
    pub fn apply(&mut self, options: &ConfigureOptions) {
        if let Some(ms) = options.async_util_timeout {
            self.async_util_timeout = Duration::from_millis(ms);
        }
        match (options.default_include_hidden_elements, options.default_hidden) {
            (Some(include), Some(hidden)) => {
                if include != hidden {
                    log::warn!(
                        "both defaultIncludeHiddenElements ({include}) and defaultHidden \
                         ({hidden}) were set; using defaultIncludeHiddenElements"
                    );
                }
                self.default_include_hidden_elements = include;
            }
            (Some(include), None) => self.default_include_hidden_elements = include,
            (None, Some(hidden)) => self.default_include_hidden_elements = hidden,
            (None, None) => {}
        }
        if let Some(names) = &options.host_component_names {
            self.host_component_names = Some(names.clone());
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}

/// Partial update accepted by [`configure`].  Also the JSON config-file shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigureOptions {
    /// Milliseconds.
    pub async_util_timeout: Option<u64>,
    /// Alias of `default_include_hidden_elements`.
    pub default_hidden: Option<bool>,
    pub default_include_hidden_elements: Option<bool>,
    pub host_component_names: Option<HostComponentNames>,
}

/// Renderer collaborator able to render the detection probe.
///
/// The probe tree must contain one host node per kind, tagged with `testID`s
/// `text`, `textInput`, `image`, `switch`, `scrollView` and `modal`.
pub trait HostProbe: Send + Sync {
    fn render_probe(&self) -> Result<Arc<Tree>>;
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn configure(options: ConfigureOptions) {
    CONFIG.write().apply(&options);
}

/// Replace the whole configuration.
pub fn configure_internal(config: Config) {
    *CONFIG.write() = config;
}

pub fn reset_to_defaults() {
    *CONFIG.write() = Config::DEFAULT;
}

pub fn get_config() -> Config {
    CONFIG.read().clone()
}

pub fn register_host_probe(probe: Arc<dyn HostProbe>) {
    *HOST_PROBE.write() = Some(probe);
}

pub fn clear_host_probe() {
    *HOST_PROBE.write() = None;
}

/// Host names from `config`, falling back to the process-wide resolution.
pub fn resolve_host_component_names(config: &Config) -> Result<HostComponentNames> {
    match &config.host_component_names {
        Some(names) => Ok(names.clone()),
        None => get_host_component_names(),
    }
}

/// Configured host names, detecting (and recording) them on first use.
pub fn get_host_component_names() -> Result<HostComponentNames> {
    if let Some(names) = CONFIG.read().host_component_names.clone() {
        return Ok(names);
    }

    let probe = HOST_PROBE.read().clone();
    let Some(probe) = probe else {
        return Err(QueryError::Configuration(format!(
            "no host component names configured and no host probe registered.\n\n{REMEDIATION}"
        )));
    };

    let names = detect_host_component_names(probe.as_ref())?;
    log::debug!("detected host component names: {names:?}");
    CONFIG.write().host_component_names = Some(names.clone());
    Ok(names)
}

/// Render the probe tree once and read each kind's resolved type name.
pub fn detect_host_component_names(probe: &dyn HostProbe) -> Result<HostComponentNames> {
    let detect = || -> Result<HostComponentNames> {
        let tree = probe.render_probe()?;
        let type_of = |test_id: &str| -> Result<String> {
            find_all(
                tree.container(),
                |node| node.prop_str("testID").as_deref() == Some(test_id),
                false,
            )
            .first()
            .map(|node| node.type_name().to_owned())
            .ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Unable to find an element with testID: {test_id:?}"
                ))
            })
        };
        let names = HostComponentNames {
            text: type_of("text")?,
            text_input: type_of("textInput")?,
            image: type_of("image")?,
            switch: type_of("switch")?,
            scroll_view: type_of("scrollView")?,
            modal: type_of("modal")?,
        };
        tree.unmount();
        Ok(names)
    };

    detect().map_err(|err| {
        QueryError::Configuration(format!(
            "Trying to detect host component names triggered the following error:\n\n{}\n\n{REMEDIATION}",
            err.base_message()
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::UiNode;
    use serial_test::serial;

    struct ProbeRenderer {
        complete: bool,
    }

    impl HostProbe for ProbeRenderer {
        fn render_probe(&self) -> Result<Arc<Tree>> {
            let mut root = UiNode::host("RCTView")
                .child(UiNode::host("RCTText").prop("testID", "text").text("Hello").build())
                .child(UiNode::host("RCTSinglelineTextInputView").prop("testID", "textInput").build())
                .child(UiNode::host("RCTImageView").prop("testID", "image").build())
                .child(UiNode::host("RCTSwitch").prop("testID", "switch").build())
                .child(UiNode::host("RCTScrollView").prop("testID", "scrollView").build());
            if self.complete {
                root = root.child(UiNode::host("RCTModalHostView").prop("testID", "modal").build());
            }
            Ok(Tree::mount(root.build()))
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        reset_to_defaults();
        let config = get_config();
        assert_eq!(config.async_util_timeout, Duration::from_millis(1000));
        assert!(!config.default_include_hidden_elements);
        assert!(config.host_component_names.is_none());
    }

    #[test]
    #[serial]
    fn test_configure_overrides_and_reset() {
        reset_to_defaults();
        configure(ConfigureOptions {
            async_util_timeout: Some(5000),
            ..Default::default()
        });
        assert_eq!(get_config().async_util_timeout, Duration::from_millis(5000));
        reset_to_defaults();
        assert_eq!(get_config().async_util_timeout, DEFAULT_ASYNC_UTIL_TIMEOUT);
    }

    #[test]
    #[serial]
    fn test_hidden_alias_last_write_wins() {
        reset_to_defaults();
        configure(ConfigureOptions {
            default_hidden: Some(true),
            ..Default::default()
        });
        assert!(get_config().default_include_hidden_elements);
        configure(ConfigureOptions {
            default_include_hidden_elements: Some(false),
            ..Default::default()
        });
        assert!(!get_config().default_include_hidden_elements);
        reset_to_defaults();
    }

    #[test]
    fn test_canonical_hidden_option_wins_within_one_call() {
        let mut config = Config::default();
        config.apply(&ConfigureOptions {
            default_hidden: Some(false),
            default_include_hidden_elements: Some(true),
            ..Default::default()
        });
        assert!(config.default_include_hidden_elements);
    }

    #[test]
    fn test_options_from_json() {
        let options: ConfigureOptions = serde_json::from_str(
            r#"{"asyncUtilTimeout": 250, "defaultHidden": true,
                "hostComponentNames": {"text": "T", "textInput": "TI", "image": "I",
                                       "switch": "S", "scrollView": "SV", "modal": "M"}}"#,
        )
        .unwrap();
        assert_eq!(options.async_util_timeout, Some(250));
        assert_eq!(options.host_component_names.unwrap().text_input, "TI");
    }

    #[test]
    fn test_detect_host_component_names() {
        let names = detect_host_component_names(&ProbeRenderer { complete: true }).unwrap();
        assert_eq!(names.text, "RCTText");
        assert_eq!(names.text_input, "RCTSinglelineTextInputView");
        assert_eq!(names.modal, "RCTModalHostView");
    }

    #[test]
    fn test_detect_failure_is_configuration_error_with_remediation() {
        let err = detect_host_component_names(&ProbeRenderer { complete: false }).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, QueryError::Configuration(_)));
        assert!(message.contains("testID: \"modal\""));
        assert!(message.contains("configure(ConfigureOptions"));
    }

    #[test]
    #[serial]
    fn test_missing_names_without_probe() {
        reset_to_defaults();
        clear_host_probe();
        let err = get_host_component_names().unwrap_err();
        assert!(matches!(err, QueryError::Configuration(_)));
    }

    #[test]
    #[serial]
    fn test_probe_result_is_recorded_once() {
        reset_to_defaults();
        register_host_probe(Arc::new(ProbeRenderer { complete: true }));
        let names = get_host_component_names().unwrap();
        assert_eq!(names.switch, "RCTSwitch");
        clear_host_probe();
        assert_eq!(get_config().host_component_names, Some(names));
        reset_to_defaults();
    }
}
