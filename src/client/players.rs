use std::collections::HashMap;
use std::sync::Arc;

use super::MetadataClient;
use crate::ChangeEvent;
use crate::Error;
use crate::Metadata;
use crate::Result;
use crate::Subscription;
use crate::Topic;

impl MetadataClient {
    pub fn get_player(
        &self,
        id: &str,
    ) -> Option<Arc<Metadata>> {
        self.players.get(id)
    }

    /// Looks a player up by its `player/username` annotation
    pub fn get_player_by_name(
        &self,
        name: &str,
    ) -> Option<Arc<Metadata>> {
        self.players.cache().get_by_name(name)
    }

    pub fn players_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> HashMap<String, Arc<Metadata>> {
        self.players.by_label(label, value)
    }

    /// Players carrying every label in `required`
    pub fn players_by_labels(
        &self,
        required: &HashMap<String, String>,
    ) -> HashMap<String, Arc<Metadata>> {
        self.players.by_labels(required)
    }

    pub fn all_players(&self) -> HashMap<String, Arc<Metadata>> {
        self.players.all()
    }

    /// Applies `mutate` to a copy of player `id` and writes it to the store.
    ///
    /// The cache reflects the change once the watch loop sees it.
    pub async fn update_player<F>(
        &self,
        id: &str,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Metadata) + Send,
    {
        self.players.update(id, mutate).await
    }

    /// Like [`update_player`](Self::update_player), resolving the key
    /// through the username index first.
    ///
    /// # Errors
    /// [`Error::PlayerNameNotFound`] if no player is indexed under `name`.
    pub async fn update_player_by_name<F>(
        &self,
        name: &str,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Metadata) + Send,
    {
        let Some(id) = self.players.cache().key_for_name(name) else {
            return Err(Error::PlayerNameNotFound { name: name.to_string() });
        };
        self.players.update(&id, mutate).await
    }

    pub async fn delete_player(
        &self,
        id: &str,
    ) -> Result<()> {
        self.players.delete(id).await
    }

    pub fn subscribe_player_changes<F>(
        &self,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(Topic::PlayerChanges, callback)
    }
}
