//! Process-wide table of plugin creators, keyed by name, version and
//! namespace.
use crate::plugin::PluginCreator;
use crate::roi_align::RoiAlignPluginCreator;
use roialign_core::internal::*;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref CREATORS: Mutex<Vec<Arc<dyn PluginCreator>>> = Mutex::new(vec![]);
}

fn with_creators<R>(f: impl FnOnce(&mut Vec<Arc<dyn PluginCreator>>) -> R) -> R {
    let mut creators = CREATORS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut creators)
}

/// Register a creator under `namespace`.
///
/// Returns false, leaving the table untouched, if a creator with the same
/// name, version and namespace is already known.
pub fn register_creator<C: PluginCreator + 'static>(mut creator: C, namespace: &str) -> bool {
    creator.set_plugin_namespace(namespace);
    with_creators(|creators| {
        let exists = creators.iter().any(|c| {
            c.plugin_name() == creator.plugin_name()
                && c.plugin_version() == creator.plugin_version()
                && c.plugin_namespace() == namespace
        });
        if exists {
            warn!(
                "Creator {} v{} already registered in namespace '{namespace}'",
                creator.plugin_name(),
                creator.plugin_version()
            );
            return false;
        }
        debug!(
            "Registering creator {} v{} in namespace '{namespace}'",
            creator.plugin_name(),
            creator.plugin_version()
        );
        creators.push(Arc::new(creator));
        true
    })
}

pub fn creator(name: &str, version: &str, namespace: &str) -> Option<Arc<dyn PluginCreator>> {
    with_creators(|creators| {
        creators
            .iter()
            .find(|c| {
                c.plugin_name() == name
                    && c.plugin_version() == version
                    && c.plugin_namespace() == namespace
            })
            .cloned()
    })
}

pub fn creators() -> Vec<Arc<dyn PluginCreator>> {
    with_creators(|creators| creators.clone())
}

/// Register the creators shipped with this crate in the default (empty)
/// namespace. Calling it more than once is harmless.
pub fn register_default_creators() {
    register_creator(RoiAlignPluginCreator::new(), "");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::roi_align::{ROI_ALIGN_PLUGIN_NAME, ROI_ALIGN_PLUGIN_VERSION};

    #[test]
    fn lookup_by_name_version_and_namespace() {
        crate::setup_test_logger();
        register_default_creators();
        register_default_creators();
        let found = creator(ROI_ALIGN_PLUGIN_NAME, ROI_ALIGN_PLUGIN_VERSION, "").unwrap();
        assert_eq!(found.plugin_name(), "ROIAlignPlugin");
        assert!(creator(ROI_ALIGN_PLUGIN_NAME, "2", "").is_none());
        assert!(creator("Nope", ROI_ALIGN_PLUGIN_VERSION, "").is_none());
        assert_eq!(
            creators()
                .iter()
                .filter(|c| c.plugin_name() == ROI_ALIGN_PLUGIN_NAME && c.plugin_namespace().is_empty())
                .count(),
            1
        );
    }

    #[test]
    fn namespaces_are_distinct() {
        assert!(register_creator(RoiAlignPluginCreator::new(), "registry-test"));
        assert!(!register_creator(RoiAlignPluginCreator::new(), "registry-test"));
        let found = creator(ROI_ALIGN_PLUGIN_NAME, ROI_ALIGN_PLUGIN_VERSION, "registry-test").unwrap();
        assert_eq!(found.plugin_namespace(), "registry-test");
    }
}
