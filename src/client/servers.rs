use std::collections::HashMap;
use std::sync::Arc;

use super::MetadataClient;
use crate::ChangeEvent;
use crate::Metadata;
use crate::Result;
use crate::Subscription;
use crate::Topic;

impl MetadataClient {
    pub fn get_server(
        &self,
        name: &str,
    ) -> Option<Arc<Metadata>> {
        self.servers.get(name)
    }

    pub fn servers_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> HashMap<String, Arc<Metadata>> {
        self.servers.by_label(label, value)
    }

    pub fn servers_by_labels(
        &self,
        required: &HashMap<String, String>,
    ) -> HashMap<String, Arc<Metadata>> {
        self.servers.by_labels(required)
    }

    pub fn all_servers(&self) -> HashMap<String, Arc<Metadata>> {
        self.servers.all()
    }

    pub async fn update_server<F>(
        &self,
        name: &str,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Metadata) + Send,
    {
        self.servers.update(name, mutate).await
    }

    pub async fn delete_server(
        &self,
        name: &str,
    ) -> Result<()> {
        self.servers.delete(name).await
    }

    pub fn subscribe_server_changes<F>(
        &self,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(Topic::ServerChanges, callback)
    }
}
