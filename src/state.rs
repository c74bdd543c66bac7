// ============================================================================
// APPLICATION STATE CACHE - session data, fetch arbitration, write-through
// ============================================================================
//
// Single source of truth for everything the screens render: the recipe
// collection, saved ids, the weekly planner, the photo gallery and the
// cook-mode cursor. Mutations write through to the store immediately;
// store failures are absorbed so the cache is never left unusable.
//
// The recipe collection loads lazily, at most one remote search per
// session. begin_*/finish_* pairs bracket the background fetches: the
// begin call sets the in-flight marker synchronously, which is what keeps
// two rapid navigations from firing two searches.
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{GatewayError, RecipeDetail, RecipeSource, SearchFilters};
use crate::offline::{AssetCache, DATASET_KEY};
use crate::store::{MEAL_PHOTOS, PLANNER_DATA, SAVED_RECIPES, Store};

// ===== Data model =====

/// Canonical recipe record. The gateway and the bundled dataset both
/// produce this shape; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub time: u32,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub calories: Option<f64>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "Recipe".to_string(),
            time: 30,
            difficulty: "Easy".to_string(),
            tags: Vec::new(),
            calories: None,
            ingredients: Vec::new(),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPhoto {
    pub id: String,
    pub data_url: String,
    pub timestamp: i64,
}

/// The seven planner slots. Wire names match the persisted blob keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKey {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayKey {
    pub const ALL: [DayKey; 7] = [
        DayKey::Mon,
        DayKey::Tue,
        DayKey::Wed,
        DayKey::Thu,
        DayKey::Fri,
        DayKey::Sat,
        DayKey::Sun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::Mon => "mon",
            DayKey::Tue => "tue",
            DayKey::Wed => "wed",
            DayKey::Thu => "thu",
            DayKey::Fri => "fri",
            DayKey::Sat => "sat",
            DayKey::Sun => "sun",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayKey::Mon => "Monday",
            DayKey::Tue => "Tuesday",
            DayKey::Wed => "Wednesday",
            DayKey::Thu => "Thursday",
            DayKey::Fri => "Friday",
            DayKey::Sat => "Saturday",
            DayKey::Sun => "Sunday",
        }
    }
}

/// Weekly planner. Every day key is always present; a partial blob on disk
/// hydrates the missing days as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Planner {
    pub mon: Vec<String>,
    pub tue: Vec<String>,
    pub wed: Vec<String>,
    pub thu: Vec<String>,
    pub fri: Vec<String>,
    pub sat: Vec<String>,
    pub sun: Vec<String>,
}

impl Planner {
    pub fn day(&self, day: DayKey) -> &Vec<String> {
        match day {
            DayKey::Mon => &self.mon,
            DayKey::Tue => &self.tue,
            DayKey::Wed => &self.wed,
            DayKey::Thu => &self.thu,
            DayKey::Fri => &self.fri,
            DayKey::Sat => &self.sat,
            DayKey::Sun => &self.sun,
        }
    }

    pub fn day_mut(&mut self, day: DayKey) -> &mut Vec<String> {
        match day {
            DayKey::Mon => &mut self.mon,
            DayKey::Tue => &mut self.tue,
            DayKey::Wed => &mut self.wed,
            DayKey::Thu => &mut self.thu,
            DayKey::Fri => &mut self.fri,
            DayKey::Sat => &mut self.sat,
            DayKey::Sun => &mut self.sun,
        }
    }

    pub fn planned_count(&self) -> usize {
        DayKey::ALL.iter().map(|d| self.day(*d).len()).sum()
    }
}

// ===== Screens =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Browse,
    Planner,
    Saved,
    Gallery,
    RecipeDetail,
    Cooking,
}

impl Screen {
    /// Resolves a screen by its wire name. Unknown names land on Home.
    pub fn from_name(name: &str) -> Screen {
        match name {
            "home" => Screen::Home,
            "browse" => Screen::Browse,
            "planner" => Screen::Planner,
            "saved" => Screen::Saved,
            "gallery" => Screen::Gallery,
            "recipe-detail" => Screen::RecipeDetail,
            "cooking" => Screen::Cooking,
            _ => Screen::Home,
        }
    }
}

/// Outcome of a cook-mode "next" press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookAdvance {
    Advanced,
    Finished,
}

// ===== State cache =====

pub struct AppState {
    pub recipes: Vec<Recipe>,
    pub recipes_loaded: bool,
    recipes_loading: bool,
    pub selected_recipe_id: Option<String>,
    pub saved_recipe_ids: Vec<String>,
    pub planner: Planner,
    pub meal_photos: Vec<MealPhoto>,
    pub cooking_step_index: usize,
    detail_loading: Option<String>,
    store: Store,
}

impl AppState {
    /// Builds the cache from whatever the store holds. Recipes are not
    /// loaded here; the first screen that needs them kicks the fetch.
    pub fn load(store: Store) -> Self {
        let saved_recipe_ids: Vec<String> = store.load(SAVED_RECIPES);
        let planner: Planner = store.load(PLANNER_DATA);
        let meal_photos: Vec<MealPhoto> = store.load(MEAL_PHOTOS);
        info!(
            saved = saved_recipe_ids.len(),
            planned = planner.planned_count(),
            photos = meal_photos.len(),
            "state loaded from store"
        );
        Self {
            recipes: Vec::new(),
            recipes_loaded: false,
            recipes_loading: false,
            selected_recipe_id: None,
            saved_recipe_ids,
            planner,
            meal_photos,
            cooking_step_index: 0,
            detail_loading: None,
            store,
        }
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn selected_recipe(&self) -> Option<&Recipe> {
        self.selected_recipe_id
            .as_deref()
            .and_then(|id| self.recipe(id))
    }

    pub fn select_recipe(&mut self, id: &str) {
        self.selected_recipe_id = Some(id.to_string());
    }

    // ===== Session recipe load =====

    pub fn recipes_loading(&self) -> bool {
        self.recipes_loading
    }

    /// Returns true when the caller should start a fetch. Already-loaded
    /// and already-loading sessions both answer false, so at most one
    /// remote search runs however quickly the user navigates.
    pub fn begin_recipes_load(&mut self) -> bool {
        if self.recipes_loaded && !self.recipes.is_empty() {
            return false;
        }
        if self.recipes_loading {
            return false;
        }
        self.recipes_loading = true;
        true
    }

    pub fn finish_recipes_load(&mut self, result: Result<Vec<Recipe>, GatewayError>) {
        self.recipes_loading = false;
        match result {
            Ok(recipes) => self.install_recipes(recipes),
            Err(err) => {
                warn!(error = %err, "recipe load failed");
                self.recipes = Vec::new();
                self.recipes_loaded = false;
                self.clamp_cooking_step();
            }
        }
    }

    /// Replaces the collection with a fresh result set, deduplicated by id.
    /// Detail fields already fetched this session are carried over so a
    /// reload never regresses a populated record.
    pub fn install_recipes(&mut self, incoming: Vec<Recipe>) {
        let previous = std::mem::take(&mut self.recipes);
        let mut installed: Vec<Recipe> = Vec::with_capacity(incoming.len());
        for mut recipe in incoming {
            if recipe.id.is_empty() || installed.iter().any(|r| r.id == recipe.id) {
                continue;
            }
            if let Some(old) = previous.iter().find(|r| r.id == recipe.id) {
                if recipe.ingredients.is_empty() && !old.ingredients.is_empty() {
                    recipe.ingredients = old.ingredients.clone();
                }
                if recipe.steps.is_empty() && !old.steps.is_empty() {
                    recipe.steps = old.steps.clone();
                }
                if recipe.calories.is_none() {
                    recipe.calories = old.calories;
                }
            }
            installed.push(recipe);
        }
        self.recipes = installed;
        self.recipes_loaded = !self.recipes.is_empty();
        self.clamp_cooking_step();
    }

    /// Drops the collection so the next screen visit refetches.
    pub fn invalidate_recipes(&mut self) {
        self.recipes.clear();
        self.recipes_loaded = false;
        self.clamp_cooking_step();
    }

    // ===== Detail load =====

    pub fn recipe_is_detailed(&self, id: &str) -> bool {
        self.recipe(id)
            .is_some_and(|r| !r.ingredients.is_empty() && !r.steps.is_empty())
    }

    pub fn is_detail_loading(&self, id: &str) -> bool {
        self.detail_loading.as_deref() == Some(id)
    }

    /// Returns true when the caller should fetch details for this id.
    /// Detailed records and an in-flight fetch for the same id answer
    /// false. A request for a different id supersedes the marker; the
    /// superseded fetch still merges when it lands.
    pub fn begin_details_load(&mut self, id: &str) -> bool {
        if self.recipe_is_detailed(id) {
            return false;
        }
        if self.detail_loading.as_deref() == Some(id) {
            return false;
        }
        self.detail_loading = Some(id.to_string());
        true
    }

    pub fn finish_details_load(
        &mut self,
        id: &str,
        result: Result<RecipeDetail, GatewayError>,
    ) -> Result<(), GatewayError> {
        if self.detail_loading.as_deref() == Some(id) {
            self.detail_loading = None;
        }
        match result {
            Ok(detail) => {
                self.merge_recipe_details(id, detail);
                Ok(())
            }
            Err(err) => {
                warn!(id, error = %err, "detail load failed");
                Err(err)
            }
        }
    }

    /// Merges fetched detail into the record with this id: name/calories
    /// overwrite only when present, ingredients/steps only when non-empty.
    /// Populated fields never regress. An id missing from the collection
    /// is appended as a brand-new record.
    pub fn merge_recipe_details(&mut self, id: &str, detail: RecipeDetail) {
        match self.recipes.iter_mut().find(|r| r.id == id) {
            Some(recipe) => {
                if let Some(name) = detail.name.filter(|n| !n.is_empty()) {
                    recipe.name = name;
                }
                if detail.calories.is_some() {
                    recipe.calories = detail.calories;
                }
                if !detail.ingredients.is_empty() {
                    recipe.ingredients = detail.ingredients;
                }
                if !detail.steps.is_empty() {
                    recipe.steps = detail.steps;
                }
            }
            None => {
                let recipe = recipe_from_detail(detail);
                if !recipe.id.is_empty() && !self.recipes.iter().any(|r| r.id == recipe.id) {
                    self.recipes.push(recipe);
                }
            }
        }
        self.clamp_cooking_step();
    }

    // ===== Saved recipes =====

    pub fn is_saved(&self, id: &str) -> bool {
        self.saved_recipe_ids.iter().any(|s| s == id)
    }

    pub fn toggle_saved(&mut self, id: &str) {
        if let Some(pos) = self.saved_recipe_ids.iter().position(|s| s == id) {
            self.saved_recipe_ids.remove(pos);
        } else {
            self.saved_recipe_ids.push(id.to_string());
        }
        self.store.save(SAVED_RECIPES, &self.saved_recipe_ids);
    }

    // ===== Planner =====

    pub fn add_to_planner(&mut self, day: DayKey, id: &str) {
        debug!(day = day.as_str(), recipe = id, "meal planned");
        self.planner.day_mut(day).push(id.to_string());
        self.store.save(PLANNER_DATA, &self.planner);
    }

    /// Out-of-bounds indices are a no-op.
    pub fn remove_from_planner(&mut self, day: DayKey, index: usize) {
        let list = self.planner.day_mut(day);
        if index >= list.len() {
            return;
        }
        list.remove(index);
        self.store.save(PLANNER_DATA, &self.planner);
    }

    pub fn clear_planner(&mut self) {
        self.planner = Planner::default();
        self.store.save(PLANNER_DATA, &self.planner);
    }

    /// Sum of the known calories planned for a day. Recipes without
    /// calorie data contribute nothing.
    pub fn planned_calories(&self, day: DayKey) -> f64 {
        self.planner
            .day(day)
            .iter()
            .filter_map(|id| self.recipe(id).and_then(|r| r.calories))
            .sum()
    }

    // ===== Gallery =====

    pub fn add_photo(&mut self, data_url: String) {
        let now = Local::now().timestamp_millis();
        let mut id_ms = now;
        while self.meal_photos.iter().any(|p| p.id == id_ms.to_string()) {
            id_ms += 1;
        }
        self.meal_photos.push(MealPhoto {
            id: id_ms.to_string(),
            data_url,
            timestamp: now,
        });
        self.store.save(MEAL_PHOTOS, &self.meal_photos);
    }

    pub fn remove_photo(&mut self, id: &str) {
        self.meal_photos.retain(|p| p.id != id);
        self.store.save(MEAL_PHOTOS, &self.meal_photos);
    }

    // ===== Cook-mode cursor =====

    pub fn reset_cooking(&mut self) {
        self.cooking_step_index = 0;
    }

    pub fn previous_cooking_step(&mut self) {
        self.cooking_step_index = self.cooking_step_index.saturating_sub(1);
    }

    /// Steps forward by one. On the last step (or with no steps at all)
    /// the session is finished and the cursor resets to 0.
    pub fn advance_cooking_step(&mut self) -> CookAdvance {
        let total = self.selected_recipe().map(|r| r.steps.len()).unwrap_or(0);
        if total == 0 || self.cooking_step_index + 1 >= total {
            self.cooking_step_index = 0;
            return CookAdvance::Finished;
        }
        self.cooking_step_index += 1;
        CookAdvance::Advanced
    }

    /// Re-clamps the cursor after any change to the selected recipe's
    /// steps.
    pub fn clamp_cooking_step(&mut self) {
        let total = self.selected_recipe().map(|r| r.steps.len()).unwrap_or(0);
        if total == 0 {
            self.cooking_step_index = 0;
        } else if self.cooking_step_index > total - 1 {
            self.cooking_step_index = total - 1;
        }
    }
}

fn recipe_from_detail(detail: RecipeDetail) -> Recipe {
    let mut tags = Vec::new();
    if detail.vegetarian {
        tags.push("Vegetarian".to_string());
    }
    if detail.vegan {
        tags.push("Vegan".to_string());
    }
    Recipe {
        id: detail.id,
        name: detail
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Recipe".to_string()),
        time: 30,
        difficulty: "Easy".to_string(),
        tags,
        calories: detail.calories,
        ingredients: detail.ingredients,
        steps: detail.steps,
    }
}

// ===== Fallback dataset =====

/// Where recipes come from when the remote search fails: a configured
/// file override, or the offline cache's seeded dataset.
pub struct FallbackRecipes {
    override_path: Option<PathBuf>,
    assets: Option<Arc<AssetCache>>,
}

impl FallbackRecipes {
    pub fn from_cache(assets: Arc<AssetCache>) -> Self {
        Self {
            override_path: None,
            assets: Some(assets),
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            override_path: Some(path),
            assets: None,
        }
    }

    pub fn load(&self) -> Result<Vec<Recipe>, GatewayError> {
        let body = if let Some(path) = &self.override_path {
            fs::read_to_string(path).map_err(|err| GatewayError::Request(err.to_string()))?
        } else if let Some(assets) = &self.assets {
            let resp = assets
                .fetch(DATASET_KEY)
                .map_err(|err| GatewayError::Request(err.to_string()))?;
            if !resp.is_success() {
                return Err(GatewayError::Status(resp.status));
            }
            resp.body
        } else {
            return Err(GatewayError::Request(
                "no fallback dataset configured".to_string(),
            ));
        };
        let recipes: Vec<Recipe> = serde_json::from_str(&body)?;
        Ok(recipes)
    }
}

/// Worker-side load: remote search first, bundled dataset on any gateway
/// failure. The error of the *fallback* is what the caller sees when both
/// legs fail.
pub fn fetch_recipes_with_fallback(
    source: &dyn RecipeSource,
    fallback: &FallbackRecipes,
) -> Result<Vec<Recipe>, GatewayError> {
    match source.search_recipes("", &SearchFilters::default()) {
        Ok(recipes) => Ok(recipes),
        Err(err) => {
            warn!(error = %err, "remote search failed, trying bundled dataset");
            fallback.load()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn state_with_store() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (AppState::load(store), dir)
    }

    fn recipe(id: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: format!("Recipe {id}"),
            ..Recipe::default()
        }
    }

    fn detailed_recipe(id: &str, ingredients: usize, steps: usize) -> Recipe {
        let mut r = recipe(id);
        r.ingredients = (0..ingredients).map(|i| format!("ingredient {i}")).collect();
        r.steps = (0..steps).map(|i| format!("step {i}")).collect();
        r
    }

    fn detail(id: &str) -> RecipeDetail {
        RecipeDetail {
            id: id.to_string(),
            name: None,
            vegetarian: false,
            vegan: false,
            calories: None,
            ingredients: Vec::new(),
            steps: Vec::new(),
        }
    }

    struct ScriptedSource {
        search_calls: AtomicUsize,
        detail_calls: AtomicUsize,
        search_results: Mutex<VecDeque<Result<Vec<Recipe>, GatewayError>>>,
        detail_results: Mutex<VecDeque<Result<RecipeDetail, GatewayError>>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                search_calls: AtomicUsize::new(0),
                detail_calls: AtomicUsize::new(0),
                search_results: Mutex::new(VecDeque::new()),
                detail_results: Mutex::new(VecDeque::new()),
            }
        }

        fn with_search(result: Result<Vec<Recipe>, GatewayError>) -> Self {
            let source = Self::new();
            source.search_results.lock().unwrap().push_back(result);
            source
        }

        fn searches(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }
    }

    impl RecipeSource for ScriptedSource {
        fn search_recipes(
            &self,
            _query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<Recipe>, GatewayError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.search_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::NoResults))
        }

        fn recipe_details(&self, id: &str) -> Result<RecipeDetail, GatewayError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.detail_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::NotFound(id.to_string())))
        }
    }

    fn missing_fallback(dir: &TempDir) -> FallbackRecipes {
        FallbackRecipes::from_file(dir.path().join("no-such-dataset.json"))
    }

    fn dataset_fallback(dir: &TempDir, recipes: &[Recipe]) -> FallbackRecipes {
        let path = dir.path().join("dataset.json");
        fs::write(&path, serde_json::to_string(recipes).unwrap()).unwrap();
        FallbackRecipes::from_file(path)
    }

    // ===== Session recipe load =====

    #[test]
    fn loaded_collection_is_reused_without_fetch() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1")]);
        assert!(state.recipes_loaded);

        assert!(!state.begin_recipes_load());
    }

    #[test]
    fn near_simultaneous_loads_run_one_search() {
        let (mut state, dir) = state_with_store();
        let source = ScriptedSource::with_search(Ok(vec![recipe("1"), recipe("2")]));
        let fallback = missing_fallback(&dir);

        // Two navigations land before the first fetch resolves.
        assert!(state.begin_recipes_load());
        assert!(!state.begin_recipes_load());

        let result = fetch_recipes_with_fallback(&source, &fallback);
        state.finish_recipes_load(result);

        assert_eq!(source.searches(), 1);
        assert!(state.recipes_loaded);
        assert_eq!(state.recipes.len(), 2);
        // Loaded now, so later visits stay quiet too.
        assert!(!state.begin_recipes_load());
    }

    #[test]
    fn failed_search_falls_back_to_dataset() {
        let (mut state, dir) = state_with_store();
        let source = ScriptedSource::with_search(Err(GatewayError::NoResults));
        let fallback = dataset_fallback(&dir, &[recipe("101"), recipe("102")]);

        assert!(state.begin_recipes_load());
        let result = fetch_recipes_with_fallback(&source, &fallback);
        state.finish_recipes_load(result);

        assert!(state.recipes_loaded);
        assert_eq!(state.recipes.len(), 2);
        assert_eq!(state.recipes[0].id, "101");
    }

    #[test]
    fn double_failure_leaves_empty_unloaded_collection() {
        let (mut state, dir) = state_with_store();
        let source = ScriptedSource::with_search(Err(GatewayError::Status(500)));
        let fallback = missing_fallback(&dir);

        assert!(state.begin_recipes_load());
        let result = fetch_recipes_with_fallback(&source, &fallback);
        state.finish_recipes_load(result);

        assert!(state.recipes.is_empty());
        assert!(!state.recipes_loaded);
        // Not loaded, so a retry is allowed to fetch again.
        assert!(state.begin_recipes_load());
    }

    #[test]
    fn empty_fallback_dataset_counts_as_not_loaded() {
        let (mut state, dir) = state_with_store();
        let source = ScriptedSource::with_search(Err(GatewayError::NoResults));
        let fallback = dataset_fallback(&dir, &[]);

        assert!(state.begin_recipes_load());
        let result = fetch_recipes_with_fallback(&source, &fallback);
        state.finish_recipes_load(result);

        assert!(state.recipes.is_empty());
        assert!(!state.recipes_loaded);
    }

    #[test]
    fn install_deduplicates_by_id() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1"), recipe("1"), recipe("2")]);
        assert_eq!(state.recipes.len(), 2);
    }

    #[test]
    fn reinstall_preserves_fetched_detail_fields() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![detailed_recipe("1", 5, 3)]);

        // A fresh search result for the same id has no detail fields.
        state.install_recipes(vec![recipe("1")]);

        assert_eq!(state.recipes[0].ingredients.len(), 5);
        assert_eq!(state.recipes[0].steps.len(), 3);
    }

    #[test]
    fn invalidate_forces_a_refetch() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1")]);
        assert!(!state.begin_recipes_load());

        state.invalidate_recipes();

        assert!(!state.recipes_loaded);
        assert!(state.begin_recipes_load());
    }

    // ===== Detail load =====

    #[test]
    fn detailed_recipe_needs_no_second_fetch() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("7")]);

        assert!(state.begin_details_load("7"));
        let mut d = detail("7");
        d.ingredients = vec!["flour".to_string()];
        d.steps = vec!["mix".to_string()];
        state.finish_details_load("7", Ok(d)).unwrap();

        // Second visit: already detailed, no fetch, contents unchanged.
        assert!(!state.begin_details_load("7"));
        assert_eq!(state.recipes[0].ingredients, vec!["flour".to_string()]);
        assert_eq!(state.recipes[0].steps, vec!["mix".to_string()]);
    }

    #[test]
    fn merge_never_regresses_populated_fields() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![detailed_recipe("7", 5, 4)]);

        let mut d = detail("7");
        d.name = Some("Renamed".to_string());
        state.merge_recipe_details("7", d);

        let merged = state.recipe("7").unwrap();
        assert_eq!(merged.name, "Renamed");
        assert_eq!(merged.ingredients.len(), 5);
        assert_eq!(merged.steps.len(), 4);
    }

    #[test]
    fn merge_overwrites_only_present_values() {
        let (mut state, _dir) = state_with_store();
        let mut existing = recipe("7");
        existing.calories = Some(300.0);
        state.install_recipes(vec![existing]);

        let mut d = detail("7");
        d.ingredients = vec!["rice".to_string()];
        d.steps = vec!["boil".to_string()];
        state.merge_recipe_details("7", d);

        let merged = state.recipe("7").unwrap();
        // Absent name and calories leave the cached values alone.
        assert_eq!(merged.name, "Recipe 7");
        assert_eq!(merged.calories, Some(300.0));
        assert_eq!(merged.ingredients, vec!["rice".to_string()]);
    }

    #[test]
    fn unknown_id_appends_new_record() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1")]);

        let mut d = detail("999");
        d.name = Some("Surprise Stew".to_string());
        d.vegetarian = true;
        d.ingredients = vec!["stock".to_string()];
        d.steps = vec!["simmer".to_string()];
        state.finish_details_load("999", Ok(d)).unwrap();

        let added = state.recipe("999").unwrap();
        assert_eq!(added.name, "Surprise Stew");
        assert_eq!(added.time, 30);
        assert_eq!(added.tags, vec!["Vegetarian".to_string()]);
    }

    #[test]
    fn superseded_detail_fetch_still_merges() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1"), recipe("2")]);

        assert!(state.begin_details_load("1"));
        // User moves on before the first fetch lands.
        assert!(state.begin_details_load("2"));
        assert!(state.is_detail_loading("2"));

        let mut d = detail("1");
        d.steps = vec!["late step".to_string()];
        state.finish_details_load("1", Ok(d)).unwrap();

        // The stale result landed, and the newer marker survived it.
        assert_eq!(state.recipe("1").unwrap().steps, vec!["late step".to_string()]);
        assert!(state.is_detail_loading("2"));
    }

    #[test]
    fn detail_failure_clears_marker_and_surfaces_error() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1")]);

        assert!(state.begin_details_load("1"));
        let err = state
            .finish_details_load("1", Err(GatewayError::NotFound("1".to_string())))
            .unwrap_err();

        assert!(matches!(err, GatewayError::NotFound(_)));
        assert!(!state.is_detail_loading("1"));
        // A retry may fetch again.
        assert!(state.begin_details_load("1"));
    }

    // ===== Saved recipes =====

    #[test]
    fn toggle_saved_twice_restores_original_set() {
        let (mut state, _dir) = state_with_store();
        state.toggle_saved("3");
        let snapshot = state.saved_recipe_ids.clone();

        state.toggle_saved("7");
        state.toggle_saved("7");

        assert_eq!(state.saved_recipe_ids, snapshot);
        assert!(state.is_saved("3"));
        assert!(!state.is_saved("7"));
    }

    #[test]
    fn saved_set_survives_reload() {
        let dir = TempDir::new().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            let mut state = AppState::load(store);
            state.toggle_saved("5");
            state.add_to_planner(DayKey::Tue, "42");
            state.add_photo("data:image/png;base64,AAAA".to_string());
        }

        let store = Store::open(dir.path()).unwrap();
        let state = AppState::load(store);
        assert!(state.is_saved("5"));
        assert_eq!(state.planner.tue, vec!["42".to_string()]);
        assert_eq!(state.meal_photos.len(), 1);
    }

    // ===== Planner =====

    #[test]
    fn out_of_bounds_removal_is_a_no_op() {
        let (mut state, _dir) = state_with_store();
        state.add_to_planner(DayKey::Mon, "1");
        state.add_to_planner(DayKey::Mon, "2");

        state.remove_from_planner(DayKey::Mon, 99);

        assert_eq!(state.planner.mon.len(), 2);
    }

    #[test]
    fn removal_targets_the_given_index() {
        let (mut state, _dir) = state_with_store();
        state.add_to_planner(DayKey::Fri, "1");
        state.add_to_planner(DayKey::Fri, "2");
        state.add_to_planner(DayKey::Fri, "1");

        state.remove_from_planner(DayKey::Fri, 1);

        assert_eq!(state.planner.fri, vec!["1".to_string(), "1".to_string()]);
    }

    #[test]
    fn clear_planner_keeps_all_seven_days_present() {
        let (mut state, _dir) = state_with_store();
        state.add_to_planner(DayKey::Tue, "42");
        state.clear_planner();

        for day in DayKey::ALL {
            assert!(state.planner.day(day).is_empty());
        }
        let value = serde_json::to_value(&state.planner).unwrap();
        let blob = value.as_object().unwrap();
        assert_eq!(blob.len(), 7);
        for day in DayKey::ALL {
            assert!(blob.contains_key(day.as_str()));
        }
    }

    #[test]
    fn duplicate_planner_entries_are_allowed() {
        let (mut state, _dir) = state_with_store();
        state.add_to_planner(DayKey::Wed, "9");
        state.add_to_planner(DayKey::Wed, "9");
        state.add_to_planner(DayKey::Sun, "9");

        assert_eq!(state.planner.wed.len(), 2);
        assert_eq!(state.planner.sun.len(), 1);
    }

    #[test]
    fn partial_planner_blob_hydrates_missing_days() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PLANNER_DATA),
            r#"{ "mon": ["1"], "wed": ["2", "3"] }"#,
        )
        .unwrap();

        let store = Store::open(dir.path()).unwrap();
        let state = AppState::load(store);

        assert_eq!(state.planner.mon, vec!["1".to_string()]);
        assert_eq!(state.planner.wed.len(), 2);
        assert!(state.planner.tue.is_empty());
        assert!(state.planner.sun.is_empty());
    }

    #[test]
    fn planned_calories_sum_known_values_only() {
        let (mut state, _dir) = state_with_store();
        let mut a = recipe("1");
        a.calories = Some(400.0);
        let b = recipe("2"); // no calorie data
        let mut c = recipe("3");
        c.calories = Some(250.5);
        state.install_recipes(vec![a, b, c]);

        state.add_to_planner(DayKey::Mon, "1");
        state.add_to_planner(DayKey::Mon, "2");
        state.add_to_planner(DayKey::Mon, "3");

        assert_eq!(state.planned_calories(DayKey::Mon), 650.5);
        assert_eq!(state.planned_calories(DayKey::Tue), 0.0);
    }

    // ===== Gallery =====

    #[test]
    fn photo_ids_stay_unique_under_rapid_insertion() {
        let (mut state, _dir) = state_with_store();
        for _ in 0..5 {
            state.add_photo("data:image/png;base64,AAAA".to_string());
        }

        let mut ids: Vec<&str> = state.meal_photos.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn remove_photo_deletes_by_id() {
        let (mut state, _dir) = state_with_store();
        state.add_photo("data:image/png;base64,AAAA".to_string());
        state.add_photo("data:image/png;base64,BBBB".to_string());
        let victim = state.meal_photos[0].id.clone();

        state.remove_photo(&victim);

        assert_eq!(state.meal_photos.len(), 1);
        assert!(state.meal_photos.iter().all(|p| p.id != victim));
    }

    #[test]
    fn photo_blob_uses_camel_case_field_names() {
        let photo = MealPhoto {
            id: "1".to_string(),
            data_url: "data:image/png;base64,AAAA".to_string(),
            timestamp: 1000,
        };
        let json = serde_json::to_string(&photo).unwrap();
        assert!(json.contains("\"dataUrl\""));
        assert!(!json.contains("data_url"));
    }

    // ===== Cook-mode cursor =====

    #[test]
    fn cursor_stays_in_bounds_under_repeated_presses() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![detailed_recipe("1", 1, 3)]);
        state.select_recipe("1");
        state.reset_cooking();

        for _ in 0..10 {
            state.previous_cooking_step();
        }
        assert_eq!(state.cooking_step_index, 0);

        assert_eq!(state.advance_cooking_step(), CookAdvance::Advanced);
        assert_eq!(state.advance_cooking_step(), CookAdvance::Advanced);
        assert_eq!(state.cooking_step_index, 2);

        // Past the last step: finished, cursor reset.
        assert_eq!(state.advance_cooking_step(), CookAdvance::Finished);
        assert_eq!(state.cooking_step_index, 0);
    }

    #[test]
    fn advancing_with_no_steps_finishes_immediately() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![recipe("1")]);
        state.select_recipe("1");

        assert_eq!(state.advance_cooking_step(), CookAdvance::Finished);
        assert_eq!(state.cooking_step_index, 0);
    }

    #[test]
    fn cursor_reclamps_when_steps_shrink() {
        let (mut state, _dir) = state_with_store();
        state.install_recipes(vec![detailed_recipe("1", 1, 5)]);
        state.select_recipe("1");
        state.cooking_step_index = 4;

        state.install_recipes(vec![detailed_recipe("1", 1, 2)]);

        assert_eq!(state.cooking_step_index, 1);
    }

    // ===== Screens =====

    #[test]
    fn screen_names_resolve_and_unknown_lands_on_home() {
        assert_eq!(Screen::from_name("browse"), Screen::Browse);
        assert_eq!(Screen::from_name("recipe-detail"), Screen::RecipeDetail);
        assert_eq!(Screen::from_name("cooking"), Screen::Cooking);
        assert_eq!(Screen::from_name("no-such-screen"), Screen::Home);
        assert_eq!(Screen::from_name(""), Screen::Home);
    }

    #[test]
    fn recipe_blob_fills_defaults_for_missing_fields() {
        let recipe: Recipe = serde_json::from_str(r#"{ "id": "x", "name": "Toast" }"#).unwrap();
        assert_eq!(recipe.time, 30);
        assert_eq!(recipe.difficulty, "Easy");
        assert!(recipe.tags.is_empty());
        assert_eq!(recipe.calories, None);
    }
}
