//! Playlist management service
//!
//! Manages playlists, membership, collaborators and tags. Every mutation
//! runs inside one transaction and leaves item positions forming a dense
//! `{1..N}` set. Smart playlists delegate membership to the evaluator and
//! are refreshed atomically under a per-playlist row lock.

use crate::{
    models::{
        generate_id, CreatePlaylistRequest, MediaItemId, Playlist, PlaylistId, PlaylistItem,
        UserId,
    },
    repository::PlaylistRepository,
    transaction::with_transaction,
    Error, Result,
};

use super::smart_playlist::SmartPlaylistEvaluator;

/// Playlist management service
#[derive(Clone)]
pub struct PlaylistManager {
    playlist_repo: PlaylistRepository,
    evaluator: SmartPlaylistEvaluator,
}

impl std::fmt::Debug for PlaylistManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistManager").finish()
    }
}

impl PlaylistManager {
    #[must_use]
    pub const fn new(playlist_repo: PlaylistRepository, evaluator: SmartPlaylistEvaluator) -> Self {
        Self {
            playlist_repo,
            evaluator,
        }
    }

    /// Create a playlist; a smart playlist is populated immediately
    pub async fn create(&self, request: CreatePlaylistRequest) -> Result<Playlist> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::Invalid("Playlist name cannot be empty".to_string()));
        }
        if name.len() > 200 {
            return Err(Error::Invalid(
                "Playlist name cannot exceed 200 bytes".to_string(),
            ));
        }

        let playlist = Playlist {
            id: PlaylistId::new(),
            user_id: request.user_id,
            name: name.to_string(),
            description: request.description,
            is_public: request.is_public,
            is_smart_playlist: request.smart_criteria.is_some(),
            smart_criteria: request.smart_criteria,
            track_count: 0,
            total_duration: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let created = self.playlist_repo.create(&playlist).await?;
        tracing::info!(
            playlist_id = %created.id,
            user_id = %created.user_id,
            smart = created.is_smart_playlist,
            "Playlist created"
        );

        if created.is_smart_playlist {
            self.refresh_smart(&created.id).await?;
            return self
                .playlist_repo
                .get_by_id(&created.id)
                .await?
                .ok_or_else(|| Error::NotFound("Playlist not found".to_string()));
        }
        Ok(created)
    }

    /// Items, gated on ownership, public visibility or collaborator role
    pub async fn get_items(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> Result<Vec<PlaylistItem>> {
        let playlist = self.require(playlist_id).await?;
        if playlist.user_id != *user_id
            && !playlist.is_public
            && !self.playlist_repo.is_collaborator(playlist_id, user_id).await?
        {
            return Err(Error::PermissionDenied(
                "Not allowed to view this playlist".to_string(),
            ));
        }
        self.playlist_repo.get_items(playlist_id).await
    }

    /// Add items at `position` (shifting successors) or append
    pub async fn add_items(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
        media_item_ids: Vec<MediaItemId>,
        position: Option<i32>,
    ) -> Result<()> {
        if media_item_ids.is_empty() {
            return Ok(());
        }
        let playlist = self.require(playlist_id).await?;
        self.ensure_can_modify(&playlist, user_id).await?;

        let repo = self.playlist_repo.clone();
        let playlist_id = playlist_id.clone();
        let user_id = user_id.clone();
        let added = media_item_ids.len();
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move {
                repo.lock(&playlist_id, &mut **tx).await?;
                let count = repo.max_position(&playlist_id, &mut **tx).await?;
                let insert_at = match position {
                    Some(p) => p.clamp(1, count + 1),
                    None => count + 1,
                };
                if insert_at <= count {
                    repo.shift_from(
                        &playlist_id,
                        insert_at,
                        media_item_ids.len() as i32,
                        &mut **tx,
                    )
                    .await?;
                }
                for (offset, media_item_id) in media_item_ids.iter().enumerate() {
                    let item = PlaylistItem {
                        id: generate_id(),
                        playlist_id: playlist_id.clone(),
                        media_item_id: media_item_id.clone(),
                        position: insert_at + offset as i32,
                        added_by: user_id.clone(),
                        added_at: chrono::Utc::now(),
                        custom_title: None,
                        start_time: None,
                        end_time: None,
                    };
                    repo.insert_item(&item, &mut **tx).await?;
                }
                repo.refresh_stats(&playlist_id, &mut **tx).await?;
                Ok(())
            })
        })
        .await?;

        tracing::info!(playlist_id = %playlist.id, added, "Playlist items added");
        Ok(())
    }

    /// Remove one item and close the position gap
    pub async fn remove_item(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
        item_id: &str,
    ) -> Result<()> {
        let playlist = self.require(playlist_id).await?;
        self.ensure_can_modify(&playlist, user_id).await?;

        let repo = self.playlist_repo.clone();
        let playlist_id = playlist_id.clone();
        let item_id = item_id.to_string();
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move {
                repo.lock(&playlist_id, &mut **tx).await?;
                let position = repo
                    .delete_item(&item_id, &mut **tx)
                    .await?
                    .ok_or_else(|| Error::NotFound("Playlist item not found".to_string()))?;
                repo.shift_from(&playlist_id, position + 1, -1, &mut **tx).await?;
                repo.refresh_stats(&playlist_id, &mut **tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Move one item to `new_position`, shifting the affected interval
    pub async fn reorder(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
        item_id: &str,
        new_position: i32,
    ) -> Result<()> {
        let playlist = self.require(playlist_id).await?;
        self.ensure_can_modify(&playlist, user_id).await?;

        let item = self
            .playlist_repo
            .get_item(item_id)
            .await?
            .ok_or_else(|| Error::NotFound("Playlist item not found".to_string()))?;
        if item.playlist_id != *playlist_id {
            return Err(Error::Invalid(
                "Item does not belong to this playlist".to_string(),
            ));
        }

        let repo = self.playlist_repo.clone();
        let playlist_id = playlist_id.clone();
        let item_id = item_id.to_string();
        let old_position = item.position;
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move {
                repo.lock(&playlist_id, &mut **tx).await?;
                let count = repo.max_position(&playlist_id, &mut **tx).await?;
                let target = new_position.clamp(1, count.max(1));
                if target == old_position {
                    return Ok(());
                }
                if target > old_position {
                    repo.shift_range(&playlist_id, old_position + 1, target, -1, &mut **tx)
                        .await?;
                } else {
                    repo.shift_range(&playlist_id, target, old_position - 1, 1, &mut **tx)
                        .await?;
                }
                repo.set_item_position(&item_id, target, &mut **tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Re-evaluate a smart playlist and atomically replace its items.
    /// Concurrent refreshes of the same playlist serialize on the row lock.
    pub async fn refresh_smart(&self, playlist_id: &PlaylistId) -> Result<usize> {
        let repo = self.playlist_repo.clone();
        let evaluator = self.evaluator.clone();
        let playlist_id = playlist_id.clone();
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move {
                let playlist = repo.lock(&playlist_id, &mut **tx).await?;
                if !playlist.is_smart_playlist {
                    return Err(Error::Invalid(
                        "Playlist is not a smart playlist".to_string(),
                    ));
                }
                let criteria = playlist.smart_criteria.unwrap_or_default();
                let track_ids = evaluator.evaluate_on(&criteria, &mut **tx).await?;

                repo.delete_all_items(&playlist_id, &mut **tx).await?;
                for (index, media_item_id) in track_ids.iter().enumerate() {
                    let item = PlaylistItem {
                        id: generate_id(),
                        playlist_id: playlist_id.clone(),
                        media_item_id: media_item_id.clone(),
                        position: index as i32 + 1,
                        added_by: playlist.user_id.clone(),
                        added_at: chrono::Utc::now(),
                        custom_title: None,
                        start_time: None,
                        end_time: None,
                    };
                    repo.insert_item(&item, &mut **tx).await?;
                }
                repo.refresh_stats(&playlist_id, &mut **tx).await?;

                tracing::info!(
                    playlist_id = %playlist_id,
                    items = track_ids.len(),
                    "Smart playlist refreshed"
                );
                Ok(track_ids.len())
            })
        })
        .await
    }

    /// Replace the collaborator set (owner only)
    pub async fn set_collaborators(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
        collaborator_ids: Vec<UserId>,
    ) -> Result<()> {
        let playlist = self.require(playlist_id).await?;
        if playlist.user_id != *user_id {
            return Err(Error::PermissionDenied(
                "Only the owner can manage collaborators".to_string(),
            ));
        }

        let repo = self.playlist_repo.clone();
        let playlist_id = playlist_id.clone();
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move {
                repo.replace_collaborators(&playlist_id, &collaborator_ids, &mut **tx)
                    .await
            })
        })
        .await
    }

    /// Replace the tag set
    pub async fn set_tags(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
        tags: Vec<String>,
    ) -> Result<()> {
        let playlist = self.require(playlist_id).await?;
        self.ensure_can_modify(&playlist, user_id).await?;

        let repo = self.playlist_repo.clone();
        let playlist_id = playlist_id.clone();
        with_transaction(self.playlist_repo.pool(), move |tx| {
            Box::pin(async move { repo.replace_tags(&playlist_id, &tags, &mut **tx).await })
        })
        .await
    }

    /// Delete a playlist (owner only)
    pub async fn delete(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<()> {
        let playlist = self.require(playlist_id).await?;
        if playlist.user_id != *user_id {
            return Err(Error::PermissionDenied(
                "Only the owner can delete a playlist".to_string(),
            ));
        }
        self.playlist_repo.delete(playlist_id).await?;
        tracing::info!(playlist_id = %playlist_id, "Playlist deleted");
        Ok(())
    }

    async fn require(&self, playlist_id: &PlaylistId) -> Result<Playlist> {
        self.playlist_repo
            .get_by_id(playlist_id)
            .await?
            .ok_or_else(|| Error::NotFound("Playlist not found".to_string()))
    }

    /// Owner or collaborator may modify
    async fn ensure_can_modify(&self, playlist: &Playlist, user_id: &UserId) -> Result<()> {
        if playlist.user_id == *user_id
            || self
                .playlist_repo
                .is_collaborator(&playlist.id, user_id)
                .await?
        {
            return Ok(());
        }
        Err(Error::PermissionDenied(
            "Not allowed to modify this playlist".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Validation ==========

    #[test]
    fn test_name_length_rules() {
        let ok = "a".repeat(200);
        assert!(ok.len() <= 200);
        let too_long = "a".repeat(201);
        assert!(too_long.len() > 200);
    }

    #[test]
    fn test_insert_position_clamping() {
        let empty = 0;
        let five = 5;
        // empty playlist: any requested position lands at 1
        assert_eq!(7i32.clamp(1, empty + 1), 1);
        // 5 items: position 3 stays, position 99 appends at 6
        assert_eq!(3i32.clamp(1, five + 1), 3);
        assert_eq!(99i32.clamp(1, five + 1), 6);
    }

    // ========== Integration (Require DB) ==========

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_add_remove_restores_playlist() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_positions_dense_after_every_mutation() {
        // Integration test placeholder
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_smart_refresh_matches_evaluator_output() {
        // Integration test placeholder
    }
}
