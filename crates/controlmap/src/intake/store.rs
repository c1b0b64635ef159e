use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::intake::{Configuration, Upload};

/// In-memory registry of uploads and configurations.
///
/// Entries are immutable, so readers get a shared `Arc` and never hold the
/// lock past the lookup.
#[derive(Default)]
pub struct IntakeStore {
    uploads: RwLock<HashMap<String, Arc<Upload>>>,
    configurations: RwLock<HashMap<String, Arc<Configuration>>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("Intake {} lock was poisoned, recovering", name);
            poisoned.into_inner()
        }
    }
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(g) => g,
        Err(poisoned) => {
            log::warn!("Intake {} lock was poisoned, recovering", name);
            poisoned.into_inner()
        }
    }
}

impl IntakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_upload(&self, upload: Upload) -> Arc<Upload> {
        let upload = Arc::new(upload);
        write(&self.uploads, "upload").insert(upload.id.clone(), Arc::clone(&upload));
        upload
    }

    pub fn upload(&self, upload_id: &str) -> Option<Arc<Upload>> {
        read(&self.uploads, "upload").get(upload_id).cloned()
    }

    pub fn insert_configuration(&self, configuration: Configuration) -> Arc<Configuration> {
        let configuration = Arc::new(configuration);
        write(&self.configurations, "configuration")
            .insert(configuration.id.clone(), Arc::clone(&configuration));
        configuration
    }

    pub fn configuration(&self, configuration_id: &str) -> Option<Arc<Configuration>> {
        read(&self.configurations, "configuration")
            .get(configuration_id)
            .cloned()
    }

    pub fn upload_count(&self) -> usize {
        read(&self.uploads, "upload").len()
    }

    pub fn configuration_count(&self) -> usize {
        read(&self.configurations, "configuration").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{FieldMappings, FrameworkInfo};
    use crate::processor::DocumentFormat;
    use chrono::Utc;
    use std::path::PathBuf;

    fn upload(id: &str) -> Upload {
        Upload {
            id: id.to_string(),
            filename: "controls.txt".to_string(),
            file_type: DocumentFormat::Text,
            size_bytes: 8,
            content_type: "text/plain".to_string(),
            stored_path: PathBuf::from(format!("/tmp/{}.txt", id)),
            extracted_text: "controls".to_string(),
            preview: "controls".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_get_upload() {
        let store = IntakeStore::new();
        store.insert_upload(upload("u1"));

        assert_eq!(store.upload("u1").unwrap().filename, "controls.txt");
        assert!(store.upload("missing").is_none());
        assert_eq!(store.upload_count(), 1);
    }

    #[test]
    fn test_insert_and_get_configuration() {
        let store = IntakeStore::new();
        let configuration = Configuration {
            id: "c1".to_string(),
            upload_id: "u1".to_string(),
            framework: FrameworkInfo {
                name: "CIS".to_string(),
                version: None,
                full_name: None,
                description: None,
            },
            providers: vec!["aws".to_string()],
            field_mappings: FieldMappings::default(),
            enable_subgroup: true,
            custom_instructions: None,
            created_at: Utc::now(),
        };
        store.insert_configuration(configuration);

        let fetched = store.configuration("c1").unwrap();
        assert_eq!(fetched.providers, vec!["aws"]);
        assert_eq!(store.configuration_count(), 1);
        assert!(store.configuration("c2").is_none());
    }
}
