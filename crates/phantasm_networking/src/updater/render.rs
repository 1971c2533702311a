//! # Render Strategies
//!
//! Turns one [`UpdateEntry`] into deliveries. Two strategies:
//!
//! ```text
//! shared                          per-viewer
//! ──────                          ──────────
//! resolve(global) per variant     resolve(global ▸ player) per player
//! format per variant              format per player
//! compile per variant             compile per player
//! bucket players by variant       one delivery per player
//! ```
//!
//! Both skip work when the resolved lines equal the lines last sent, and
//! both refuse the whole request when an identity row is too short. On
//! spawn, every recipient gets the previous removals, even one whose new
//! lines are empty.

use phantasm_core::{
    resolve_lines, resolve_translations, CallType, GridFormatter, Layered, PlaceholderMap, PlayerId,
};
use std::sync::Arc;

use super::compiler::PacketCompiler;
use super::entries::{Anchor, Delivery, MoveEntry, UpdateEntry};
use crate::error::{UpdateError, UpdateResult};
use crate::hologram::{RenderCache, SpawnedRender};
use crate::protocol::Packet;

/// Stateless renderer run by the worker.
#[derive(Clone)]
pub struct Renderer {
    compiler: PacketCompiler,
    formatter: Arc<dyn GridFormatter>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a renderer.
    #[must_use]
    pub fn new(compiler: PacketCompiler, formatter: Arc<dyn GridFormatter>) -> Self {
        Self { compiler, formatter }
    }

    /// Renders a request. Updates anchor caches as a side effect.
    pub fn render(&self, entry: &UpdateEntry) -> UpdateResult<Vec<Delivery>> {
        if entry.players.is_empty() {
            return Ok(Vec::new());
        }

        if entry.grid.enabled {
            if let Some(source) = &entry.grid.source {
                if source.call_type() == CallType::Async {
                    source.load();
                }
            }
        }

        if entry.visitor_sensitive {
            self.render_per_viewer(entry)
        } else {
            self.render_shared(entry)
        }
    }

    /// Move packets for a reposition request.
    #[must_use]
    pub fn reposition(&self, entry: &MoveEntry) -> Delivery {
        let cache = entry.entry.render_cache();
        Delivery {
            packets: self.compiler.reposition(cache.removals(), entry.position),
            players: entry.players.clone(),
        }
    }

    fn format(&self, lines: Vec<String>, entry: &UpdateEntry) -> Vec<String> {
        if entry.grid.enabled {
            self.formatter.format(lines, &entry.grid)
        } else {
            lines
        }
    }

    fn check_capacity(entry: &UpdateEntry, lines: usize) -> UpdateResult<()> {
        match entry.anchors.iter().find(|a| a.identities.len() < lines) {
            Some(anchor) => Err(UpdateError::IdentityShortfall {
                hologram: entry.hologram.clone(),
                lines,
                identities: anchor.identities.len(),
            }),
            None => Ok(()),
        }
    }

    fn previous_removals(entry: &UpdateEntry, caches: &[Arc<RenderCache>]) -> Vec<Packet> {
        if !entry.spawn {
            return Vec::new();
        }
        caches.iter().flat_map(|c| c.removal_packets()).collect()
    }

    fn render_shared(&self, entry: &UpdateEntry) -> UpdateResult<Vec<Delivery>> {
        let mut variants =
            resolve_translations(&entry.translations, &entry.matched, &entry.placeholders);

        let first_empty = variants.first().map_or(true, Vec::is_empty);
        if first_empty && !entry.grid.is_source_ready() {
            tracing::trace!("Hologram {} has nothing to render", entry.hologram);
            return Ok(Vec::new());
        }

        if entry.grid.enabled {
            if variants.is_empty() {
                variants.push(Vec::new());
            }
            variants = variants
                .into_iter()
                .map(|lines| self.format(lines, entry))
                .collect();
        }

        if !entry.spawn && entry.old_lines.as_ref() == Some(&variants) {
            tracing::trace!("Hologram {} unchanged, skipping", entry.hologram);
            return Ok(Vec::new());
        }

        for lines in &variants {
            Self::check_capacity(entry, lines.len())?;
        }

        let caches: Vec<_> = entry.anchors.iter().map(|a| a.entry.render_cache()).collect();
        let removals = Self::previous_removals(entry, &caches);
        let mut per_variant: Vec<Vec<Packet>> = vec![Vec::new(); variants.len()];

        for (anchor, cache) in entry.anchors.iter().zip(&caches) {
            if entry.spawn {
                let compiled = self.compile_variants(anchor, &variants, entry);

                if entry.recache || cache.is_empty() {
                    Self::store_cache(anchor, &anchor.identities, entry);
                }

                for (bucket, packets) in per_variant.iter_mut().zip(compiled) {
                    bucket.extend(packets);
                }
            } else {
                for (bucket, lines) in per_variant.iter_mut().zip(&variants) {
                    bucket.extend(self.compiler.set_text(lines, &anchor.identities));
                }
            }
        }

        let mut buckets: Vec<Vec<PlayerId>> = vec![Vec::new(); per_variant.len()];
        for viewer in &entry.players {
            if let Some(bucket) = buckets.get_mut(viewer.variant_index(per_variant.len())) {
                bucket.push(viewer.player);
            }
        }

        Ok(per_variant
            .into_iter()
            .zip(buckets)
            .map(|(packets, players)| {
                let mut all = removals.clone();
                all.extend(packets);
                Delivery { packets: all, players }
            })
            .filter(|delivery| !delivery.is_empty())
            .collect())
    }

    /// Spawn packets per variant for one anchor, reusing the anchor's last
    /// compile when nothing it depends on changed.
    fn compile_variants(&self, anchor: &Anchor, variants: &[Vec<String>], entry: &UpdateEntry) -> Vec<Vec<Packet>> {
        let previous = anchor.entry.spawned_render();
        if previous.matches(anchor.position, &anchor.identities, variants) {
            tracing::trace!("Reusing spawn packets for hologram {}", entry.hologram);
            return previous.packets().to_vec();
        }

        let compiled: Vec<Vec<Packet>> = variants
            .iter()
            .map(|lines| self.compiler.compile(lines, anchor.position, &anchor.identities))
            .collect();
        anchor.entry.cache_spawned(SpawnedRender::new(
            anchor.position,
            anchor.identities.clone(),
            variants.to_vec(),
            compiled.clone(),
        ));
        compiled
    }

    fn render_per_viewer(&self, entry: &UpdateEntry) -> UpdateResult<Vec<Delivery>> {
        if entry.translations.is_empty() && !entry.grid.has_source() {
            return Ok(Vec::new());
        }

        let no_values = PlaceholderMap::new();
        let variant_count = entry.translations.len();
        let mut plans: Vec<(PlayerId, Vec<String>)> = Vec::with_capacity(entry.players.len());

        for viewer in &entry.players {
            let variant = viewer.variant_index(variant_count);
            let lines = match entry.translations.get(variant) {
                Some(raw) => {
                    let personal = entry.player_placeholders.get(&viewer.player).unwrap_or(&no_values);
                    let values = Layered::new(&entry.placeholders, personal);
                    let matches = entry.matched.get(variant).map_or(&[][..], Vec::as_slice);
                    resolve_lines(raw, matches, &values)
                }
                None => Vec::new(),
            };
            let lines = self.format(lines, entry);

            if lines.is_empty() {
                // Still owes the previous removals.
                if entry.spawn {
                    plans.push((viewer.player, lines));
                }
                continue;
            }

            let unchanged = entry
                .old_lines
                .as_ref()
                .and_then(|old| old.get(variant))
                .is_some_and(|old| *old == lines);
            if !entry.spawn && unchanged {
                tracing::trace!("Hologram {} unchanged for {}, skipping", entry.hologram, viewer.player);
                continue;
            }

            Self::check_capacity(entry, lines.len())?;
            plans.push((viewer.player, lines));
        }

        if plans.is_empty() {
            return Ok(Vec::new());
        }

        let caches: Vec<_> = entry.anchors.iter().map(|a| a.entry.render_cache()).collect();
        let removals = Self::previous_removals(entry, &caches);

        let mut deliveries = Vec::with_capacity(plans.len());
        for (player, lines) in &plans {
            let mut packets = removals.clone();
            for (anchor, cache) in entry.anchors.iter().zip(&caches) {
                if !entry.spawn && !cache.is_empty() {
                    packets.extend(self.compiler.set_text(lines, &anchor.identities));
                } else {
                    packets.extend(self.compiler.compile(lines, anchor.position, &anchor.identities));
                }
            }
            if !packets.is_empty() {
                deliveries.push(Delivery {
                    packets,
                    players: vec![*player],
                });
            }
        }

        for (anchor, cache) in entry.anchors.iter().zip(&caches) {
            anchor.entry.clear_spawned();
            if entry.spawn || cache.is_empty() {
                Self::store_cache(anchor, &anchor.identities, entry);
            }
        }

        Ok(deliveries)
    }

    fn store_cache(anchor: &Anchor, identities: &[phantasm_core::EntityIdentity], entry: &UpdateEntry) {
        anchor.entry.replace_cache(RenderCache::new(
            PacketCompiler::removals(identities),
            entry.grid.layout_revision,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hologram::EntityEntry;
    use phantasm_core::{
        EntityIdentity, GridSettings, GridSource, MatchedPlaceholder, Passthrough, PlayerEntry, Vec3,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ids(range: std::ops::Range<u64>) -> Vec<EntityIdentity> {
        range.map(EntityIdentity::new).collect()
    }

    fn text(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_owned()).collect()
    }

    fn renderer() -> Renderer {
        Renderer::new(PacketCompiler::new(0.25), Arc::new(Passthrough))
    }

    fn request(translations: Vec<Vec<String>>, anchors: Vec<Anchor>, players: Vec<PlayerEntry>) -> UpdateEntry {
        UpdateEntry {
            hologram: "test".to_owned(),
            visitor_sensitive: false,
            spawn: true,
            recache: true,
            grid: GridSettings::disabled(),
            old_lines: None,
            translations,
            anchors,
            players,
            placeholders: PlaceholderMap::new(),
            player_placeholders: HashMap::new(),
            matched: Vec::new(),
        }
    }

    fn anchor(entry: &Arc<EntityEntry>, identities: Vec<EntityIdentity>) -> Anchor {
        Anchor {
            entry: Arc::clone(entry),
            position: entry.position(),
            identities,
        }
    }

    fn viewer(id: u64, language: Option<usize>) -> PlayerEntry {
        PlayerEntry::new(PlayerId(id), language)
    }

    #[test]
    fn test_shared_spawn_buckets_by_variant() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let req = request(
            vec![text(&["Hello", "World"]), text(&["Hallo", "Welt"])],
            vec![anchor(&entry, ids(1..3))],
            vec![viewer(1, Some(0)), viewer(2, Some(1)), viewer(3, Some(9))],
        );

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].players, vec![PlayerId(1), PlayerId(3)]);
        assert_eq!(deliveries[1].players, vec![PlayerId(2)]);
        assert_eq!(deliveries[1].packets[0].text(), Some("Welt"));
        // Variants share the identity row.
        assert_eq!(entry.render_cache().identities(), ids(1..3));
        assert_eq!(entry.spawned_render().packets().len(), 2);
    }

    #[test]
    fn test_shared_groups_variants_across_anchors() {
        let a = Arc::new(EntityEntry::new(Vec3::ZERO));
        let b = Arc::new(EntityEntry::new(Vec3::new(10.0, 0.0, 0.0)));
        let req = request(
            vec![text(&["en"]), text(&["de"])],
            vec![anchor(&a, ids(1..2)), anchor(&b, ids(2..3))],
            vec![viewer(1, Some(0)), viewer(2, Some(1))],
        );

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 2);
        for (delivery, expected) in deliveries.iter().zip(["en", "de"]) {
            assert_eq!(delivery.packets.len(), 2);
            assert!(delivery.packets.iter().all(|p| p.text() == Some(expected)));
        }
    }

    #[test]
    fn test_shared_update_retexts_in_place() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(5..7)), 0));

        let mut req = request(vec![text(&["a", "b"])], vec![anchor(&entry, ids(5..7))], vec![viewer(1, None)]);
        req.spawn = false;
        req.recache = false;

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 1);
        let packets = &deliveries[0].packets;
        assert_eq!(packets, &vec![Packet::set_text(EntityIdentity::new(5), "a"), Packet::set_text(EntityIdentity::new(6), "b")]);
    }

    #[test]
    fn test_spawn_prepends_previous_removals() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(1..4)), 0));

        let req = request(vec![text(&["a", "b", "c", "d"])], vec![anchor(&entry, ids(10..14))], vec![viewer(1, None)]);

        let deliveries = renderer().render(&req).unwrap();
        let packets = &deliveries[0].packets;

        assert_eq!(packets.len(), 7);
        assert!(packets[..3].iter().all(|p| matches!(p, Packet::Remove(_))));
        assert!(packets[3..].iter().all(|p| matches!(p, Packet::Spawn(_))));
        assert_eq!(entry.render_cache().identities(), ids(10..14));
    }

    #[test]
    fn test_unchanged_lines_are_skipped() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(1..3)), 0));

        let mut req = request(vec![text(&["a", "b"])], vec![anchor(&entry, ids(1..3))], vec![viewer(1, None)]);
        req.spawn = false;
        req.recache = false;
        req.old_lines = Some(vec![text(&["a", "b"])]);

        assert!(renderer().render(&req).unwrap().is_empty());

        req.visitor_sensitive = true;
        assert!(renderer().render(&req).unwrap().is_empty());
    }

    #[test]
    fn test_shortfall_aborts_without_side_effects() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let req = request(vec![text(&["a", "b", "c"])], vec![anchor(&entry, ids(1..3))], vec![viewer(1, None)]);

        let err = renderer().render(&req).unwrap_err();

        assert!(matches!(err, UpdateError::IdentityShortfall { lines: 3, identities: 2, .. }));
        assert!(entry.render_cache().is_empty());
    }

    #[test]
    fn test_per_viewer_resolves_each_player() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let mut req = request(vec![text(&["Hi {name}"])], vec![anchor(&entry, ids(1..2))], vec![viewer(1, None), viewer(2, None), viewer(3, None)]);
        req.visitor_sensitive = true;
        req.matched = vec![vec![vec![MatchedPlaceholder::braced("name")]]];
        req.player_placeholders = HashMap::from([
            (PlayerId(1), PlaceholderMap::from([("name".to_owned(), "Ada".to_owned())])),
            (PlayerId(2), PlaceholderMap::from([("name".to_owned(), "Linus".to_owned())])),
        ]);
        entry.cache_spawned(SpawnedRender::new(
            Vec3::ZERO,
            ids(1..2),
            vec![text(&["Hi {name}"])],
            vec![vec![Packet::spawn(EntityIdentity::new(1), Vec3::ZERO, "Hi {name}")]],
        ));

        let deliveries = renderer().render(&req).unwrap();

        let texts: Vec<_> = deliveries.iter().map(|d| d.packets[0].text().unwrap().to_owned()).collect();
        assert_eq!(texts, vec!["Hi Ada", "Hi Linus", "Hi {name}"]);
        assert!(deliveries.iter().all(|d| d.players.len() == 1));
        assert!(entry.spawned_render().is_empty());
        assert_eq!(entry.render_cache().identities(), ids(1..2));
    }

    #[test]
    fn test_global_values_win_over_player_values() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let mut req = request(vec![text(&["{server}"])], vec![anchor(&entry, ids(1..2))], vec![viewer(1, None)]);
        req.visitor_sensitive = true;
        req.matched = vec![vec![vec![MatchedPlaceholder::braced("server")]]];
        req.placeholders = PlaceholderMap::from([("server".to_owned(), "Lobby".to_owned())]);
        req.player_placeholders = HashMap::from([(PlayerId(1), PlaceholderMap::from([("server".to_owned(), "Mine".to_owned())]))]);

        let deliveries = renderer().render(&req).unwrap();
        assert_eq!(deliveries[0].packets[0].text(), Some("Lobby"));
    }

    struct LateSource {
        loaded: AtomicBool,
    }

    impl GridSource for LateSource {
        fn limit(&self) -> usize {
            2
        }

        fn supports_header(&self) -> bool {
            false
        }

        fn call_type(&self) -> CallType {
            CallType::Async
        }

        fn load(&self) {
            self.loaded.store(true, Ordering::Release);
        }

        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::Acquire)
        }
    }

    struct AppendRows;

    impl GridFormatter for AppendRows {
        fn format(&self, mut lines: Vec<String>, grid: &GridSettings) -> Vec<String> {
            let rows = grid.source.as_ref().map_or(0, |s| s.limit());
            lines.extend((0..rows).map(|i| format!("row {i}")));
            lines
        }
    }

    #[test]
    fn test_async_grid_source_loads_on_worker() {
        let source = Arc::new(LateSource {
            loaded: AtomicBool::new(false),
        });
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let mut req = request(Vec::new(), vec![anchor(&entry, ids(1..3))], vec![viewer(1, None)]);
        req.grid = GridSettings::with_source(source.clone(), false);

        let renderer = Renderer::new(PacketCompiler::default(), Arc::new(AppendRows));
        let deliveries = renderer.render(&req).unwrap();

        assert!(source.is_loaded());
        assert_eq!(deliveries.len(), 1);
        let texts: Vec<_> = deliveries[0].packets.iter().filter_map(Packet::text).collect();
        assert_eq!(texts, vec!["row 1", "row 0"]);
    }

    #[test]
    fn test_reposition_uses_cache() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let mv = MoveEntry {
            entry: Arc::clone(&entry),
            position: Vec3::new(0.0, 5.0, 0.0),
            players: vec![PlayerId(1)],
        };

        assert!(renderer().reposition(&mv).is_empty());

        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(1..3)), 0));
        let delivery = renderer().reposition(&mv);

        assert_eq!(delivery.packets, vec![
            Packet::move_to(EntityIdentity::new(2), Vec3::new(0.0, 5.0, 0.0)),
            Packet::move_to(EntityIdentity::new(1), Vec3::new(0.0, 5.25, 0.0)),
        ]);
    }

    #[test]
    fn test_longer_variant_does_not_block_shorter_one() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let req = request(
            vec![text(&["Hello"]), text(&["Hallo", "Welt"])],
            vec![anchor(&entry, ids(1..3))],
            vec![viewer(1, Some(0)), viewer(2, Some(1))],
        );

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].players, vec![PlayerId(1)]);
        assert_eq!(deliveries[0].packets, vec![Packet::spawn(EntityIdentity::new(2), Vec3::ZERO, "Hello")]);
        assert_eq!(deliveries[1].players, vec![PlayerId(2)]);
        assert_eq!(deliveries[1].packets.len(), 2);
    }

    #[test]
    fn test_empty_variant_still_receives_removals() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(1..3)), 0));

        let req = request(
            vec![text(&["A", "B", "C"]), Vec::new()],
            vec![anchor(&entry, ids(10..13))],
            vec![viewer(1, Some(0)), viewer(2, Some(1))],
        );

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 2);
        let german = deliveries.iter().find(|d| d.players == vec![PlayerId(2)]).unwrap();
        assert_eq!(german.packets, vec![Packet::remove(EntityIdentity::new(1)), Packet::remove(EntityIdentity::new(2))]);
        assert_eq!(entry.render_cache().identities(), ids(10..13));
    }

    #[test]
    fn test_per_viewer_empty_lines_still_receive_removals() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        entry.replace_cache(RenderCache::new(PacketCompiler::removals(&ids(1..3)), 0));

        let mut req = request(
            vec![text(&["A", "B"]), Vec::new()],
            vec![anchor(&entry, ids(10..12))],
            vec![viewer(1, Some(0)), viewer(2, Some(1))],
        );
        req.visitor_sensitive = true;

        let deliveries = renderer().render(&req).unwrap();

        assert_eq!(deliveries.len(), 2);
        let second = deliveries.iter().find(|d| d.players == vec![PlayerId(2)]).unwrap();
        assert_eq!(second.packets.len(), 2);
        assert!(second.packets.iter().all(|p| matches!(p, Packet::Remove(_))));

        // Without a spawn there is nothing to remove, so nothing is sent.
        req.spawn = false;
        req.recache = false;
        let deliveries = renderer().render(&req).unwrap();
        assert!(deliveries.iter().all(|d| d.players == vec![PlayerId(1)]));
    }

    #[test]
    fn test_unchanged_spawn_reuses_compiled_packets() {
        let entry = Arc::new(EntityEntry::new(Vec3::ZERO));
        let mut req = request(vec![text(&["a", "b"])], vec![anchor(&entry, ids(1..3))], vec![viewer(1, None)]);

        let first = renderer().render(&req).unwrap();
        let compiled = entry.spawned_render();

        // A newly arrived viewer gets the same spawn.
        req.recache = false;
        req.players = vec![viewer(2, None)];
        let second = renderer().render(&req).unwrap();

        assert!(Arc::ptr_eq(&compiled, &entry.spawned_render()));
        assert_eq!(first[0].packets, second[0].packets[2..]);

        req.translations = vec![text(&["a", "c"])];
        renderer().render(&req).unwrap();
        assert!(!Arc::ptr_eq(&compiled, &entry.spawned_render()));
    }
}
