// ============================================================================
// REMOTE RECIPE GATEWAY - HTTP search/detail with canonical normalization
// ============================================================================
//
// Talks to a Spoonacular-shaped recipe API through the offline asset cache
// and maps its loosely-typed responses into the canonical Recipe shape.
// Every optional field gets its default here, at the boundary, so the rest
// of the app never sees raw API records.
// ============================================================================

use std::sync::{Arc, OnceLock};

use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::offline::{AssetCache, ResponseSource};
use crate::state::Recipe;

pub const SEARCH_PAGE_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("recipe service returned status {0}")]
    Status(u16),
    #[error("recipe {0} not found")]
    NotFound(String),
    #[error("no recipes matched the search")]
    NoResults,
    #[error("failed to decode recipe response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Request(String),
}

/// Search refinements forwarded to the remote API.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchFilters {
    pub vegetarian: bool,
    pub max_ready_time: Option<u32>,
}

/// The remote side of a detail fetch. Fields are optional where the API may
/// omit them; the state cache decides what to merge.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub id: String,
    pub name: Option<String>,
    pub vegetarian: bool,
    pub vegan: bool,
    pub calories: Option<f64>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

/// Seam between the state cache and whatever provides recipe data. The app
/// wires in the HTTP gateway; tests wire in scripted fakes.
pub trait RecipeSource: Send + Sync {
    fn search_recipes(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<Recipe>, GatewayError>;

    fn recipe_details(&self, id: &str) -> Result<RecipeDetail, GatewayError>;
}

pub struct RecipeApi {
    assets: Arc<AssetCache>,
    base: String,
    key: Option<String>,
}

impl RecipeApi {
    pub fn new(assets: Arc<AssetCache>, base: impl Into<String>, key: Option<String>) -> Self {
        Self {
            assets,
            base: base.into(),
            key,
        }
    }

    fn get(&self, url: &Url) -> Result<crate::offline::CachedResponse, GatewayError> {
        let resp = self
            .assets
            .fetch(url.as_str())
            .map_err(|err| GatewayError::Request(err.to_string()))?;
        // The offline page is not recipe data; treat it as a failed request.
        if resp.source == ResponseSource::OfflineFallback {
            return Err(GatewayError::Request("network unreachable".to_string()));
        }
        Ok(resp)
    }
}

impl RecipeSource for RecipeApi {
    fn search_recipes(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<Recipe>, GatewayError> {
        let url = search_url(&self.base, self.key.as_deref(), query, filters)?;
        let resp = self.get(&url)?;
        if !resp.is_success() {
            return Err(GatewayError::Status(resp.status));
        }

        let parsed: SearchResponse = serde_json::from_str(&resp.body)?;
        if parsed.results.is_empty() {
            return Err(GatewayError::NoResults);
        }
        let recipes: Vec<Recipe> = parsed
            .results
            .into_iter()
            .filter_map(recipe_from_search)
            .collect();
        if recipes.is_empty() {
            return Err(GatewayError::NoResults);
        }
        debug!(count = recipes.len(), "search returned recipes");
        Ok(recipes)
    }

    fn recipe_details(&self, id: &str) -> Result<RecipeDetail, GatewayError> {
        let url = detail_url(&self.base, self.key.as_deref(), id)?;
        let resp = self.get(&url)?;
        if resp.status == 404 {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        if !resp.is_success() {
            return Err(GatewayError::Status(resp.status));
        }

        let raw: RawRecipeDetail = serde_json::from_str(&resp.body)?;
        let mut detail = detail_from_raw(raw);
        if detail.id.is_empty() {
            detail.id = id.to_string();
        }
        Ok(detail)
    }
}

// ===== URL construction =====

fn search_url(
    base: &str,
    key: Option<&str>,
    query: &str,
    filters: &SearchFilters,
) -> Result<Url, GatewayError> {
    let mut url = Url::parse(&format!(
        "{}/recipes/complexSearch",
        base.trim_end_matches('/')
    ))
    .map_err(|err| GatewayError::Request(err.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(key) = key {
            pairs.append_pair("apiKey", key);
        }
        pairs.append_pair("query", query);
        pairs.append_pair("addRecipeInformation", "true");
        pairs.append_pair("number", &SEARCH_PAGE_SIZE.to_string());
        if filters.vegetarian {
            pairs.append_pair("diet", "vegetarian");
        }
        if let Some(minutes) = filters.max_ready_time {
            pairs.append_pair("maxReadyTime", &minutes.to_string());
        }
    }
    Ok(url)
}

fn detail_url(base: &str, key: Option<&str>, id: &str) -> Result<Url, GatewayError> {
    let mut url = Url::parse(&format!(
        "{}/recipes/{}/information",
        base.trim_end_matches('/'),
        id
    ))
    .map_err(|err| GatewayError::Request(err.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(key) = key {
            pairs.append_pair("apiKey", key);
        }
        pairs.append_pair("includeNutrition", "true");
    }
    Ok(url)
}

// ===== Raw response shapes =====

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSearchResult {
    id: Option<Value>,
    title: Option<String>,
    ready_in_minutes: Option<u32>,
    vegetarian: bool,
    vegan: bool,
    diets: Vec<String>,
    nutrition: Option<RawNutrition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNutrition {
    nutrients: Vec<RawNutrient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNutrient {
    name: String,
    amount: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRecipeDetail {
    id: Option<Value>,
    title: Option<String>,
    vegetarian: bool,
    vegan: bool,
    diets: Vec<String>,
    extended_ingredients: Vec<RawIngredient>,
    analyzed_instructions: Vec<RawInstructionBlock>,
    nutrition: Option<RawNutrition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIngredient {
    original: Option<String>,
    name: Option<String>,
    amount: Option<f64>,
    unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInstructionBlock {
    steps: Vec<RawStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStep {
    step: String,
}

// ===== Normalization =====

/// Maps one raw search result into a canonical recipe. Records without a
/// usable id are dropped.
fn recipe_from_search(raw: RawSearchResult) -> Option<Recipe> {
    let id = id_string(&raw.id)?;
    let name = raw
        .title
        .as_deref()
        .map(strip_html)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Recipe".to_string());
    let time = raw.ready_in_minutes.filter(|&m| m > 0).unwrap_or(30);

    let mut tags = Vec::new();
    if raw.vegetarian || diet_listed(&raw.diets, "vegetarian") {
        tags.push("Vegetarian".to_string());
    }
    if raw.vegan || diet_listed(&raw.diets, "vegan") {
        tags.push("Vegan".to_string());
    }

    let calories = raw
        .nutrition
        .as_ref()
        .and_then(|n| calories_amount(&n.nutrients));

    Some(Recipe {
        id,
        name,
        time,
        difficulty: "Easy".to_string(),
        tags,
        calories,
        ingredients: Vec::new(),
        steps: Vec::new(),
    })
}

fn detail_from_raw(raw: RawRecipeDetail) -> RecipeDetail {
    let ingredients: Vec<String> = raw
        .extended_ingredients
        .into_iter()
        .filter_map(ingredient_text)
        .collect();
    let steps: Vec<String> = raw
        .analyzed_instructions
        .into_iter()
        .next()
        .map(|block| {
            block
                .steps
                .into_iter()
                .map(|s| strip_html(&s.step))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    RecipeDetail {
        id: id_string(&raw.id).unwrap_or_default(),
        name: raw
            .title
            .as_deref()
            .map(strip_html)
            .filter(|t| !t.is_empty()),
        vegetarian: raw.vegetarian || diet_listed(&raw.diets, "vegetarian"),
        vegan: raw.vegan || diet_listed(&raw.diets, "vegan"),
        calories: raw
            .nutrition
            .as_ref()
            .and_then(|n| calories_amount(&n.nutrients)),
        ingredients,
        steps,
    }
}

/// Ingredient display text: the API's pre-built line wins, then the bare
/// name, then whatever quantity information is left.
fn ingredient_text(raw: RawIngredient) -> Option<String> {
    if let Some(text) = raw
        .original
        .as_deref()
        .map(strip_html)
        .filter(|t| !t.is_empty())
    {
        return Some(text);
    }
    if let Some(name) = raw
        .name
        .as_deref()
        .map(strip_html)
        .filter(|t| !t.is_empty())
    {
        return Some(name);
    }

    let amount = raw.amount.map(|a| a.to_string()).unwrap_or_default();
    let unit = raw.unit.unwrap_or_default();
    let text = format!("{amount} {unit}").trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn diet_listed(diets: &[String], diet: &str) -> bool {
    diets.iter().any(|d| d.eq_ignore_ascii_case(diet))
}

fn calories_amount(nutrients: &[RawNutrient]) -> Option<f64> {
    nutrients
        .iter()
        .find(|n| n.name == "Calories")
        .map(|n| n.amount)
        .filter(|a| a.is_finite() && *a > 0.0)
}

fn id_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

static TAG_RE: OnceLock<Regex> = OnceLock::new();

/// Reduces API markup to plain text: tags go, the usual entities decode,
/// whitespace collapses.
pub fn strip_html(input: &str) -> String {
    let re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
    let text = re.replace_all(input, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_search(json: serde_json::Value) -> RawSearchResult {
        serde_json::from_value(json).unwrap()
    }

    fn raw_detail(json: serde_json::Value) -> RawRecipeDetail {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn search_url_carries_expected_parameters() {
        let filters = SearchFilters {
            vegetarian: true,
            max_ready_time: Some(25),
        };
        let url = search_url("https://api.example.com", Some("k123"), "pasta", &filters).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("apiKey".into(), "k123".into())));
        assert!(pairs.contains(&("query".into(), "pasta".into())));
        assert!(pairs.contains(&("addRecipeInformation".into(), "true".into())));
        assert!(pairs.contains(&("number".into(), "20".into())));
        assert!(pairs.contains(&("diet".into(), "vegetarian".into())));
        assert!(pairs.contains(&("maxReadyTime".into(), "25".into())));
        assert!(url.path().ends_with("/recipes/complexSearch"));
    }

    #[test]
    fn search_url_omits_unset_parameters() {
        let url = search_url(
            "https://api.example.com/",
            None,
            "",
            &SearchFilters::default(),
        )
        .unwrap();

        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert!(!keys.contains(&"apiKey".to_string()));
        assert!(!keys.contains(&"diet".to_string()));
        assert!(!keys.contains(&"maxReadyTime".to_string()));
    }

    #[test]
    fn detail_url_targets_recipe_information() {
        let url = detail_url("https://api.example.com", Some("k123"), "716429").unwrap();
        assert!(url.path().ends_with("/recipes/716429/information"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("includeNutrition".into(), "true".into())));
    }

    #[test]
    fn search_result_gets_defaults_for_missing_fields() {
        let recipe = recipe_from_search(raw_search(serde_json::json!({ "id": 7 }))).unwrap();

        assert_eq!(recipe.id, "7");
        assert_eq!(recipe.name, "Recipe");
        assert_eq!(recipe.time, 30);
        assert_eq!(recipe.difficulty, "Easy");
        assert!(recipe.tags.is_empty());
        assert_eq!(recipe.calories, None);
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.steps.is_empty());
    }

    #[test]
    fn search_result_maps_known_fields() {
        let recipe = recipe_from_search(raw_search(serde_json::json!({
            "id": 42,
            "title": "Tofu <b>Bowl</b>",
            "readyInMinutes": 15,
            "vegetarian": true,
            "nutrition": { "nutrients": [
                { "name": "Fat", "amount": 12.0 },
                { "name": "Calories", "amount": 480.5 }
            ]}
        })))
        .unwrap();

        assert_eq!(recipe.name, "Tofu Bowl");
        assert_eq!(recipe.time, 15);
        assert_eq!(recipe.tags, vec!["Vegetarian".to_string()]);
        assert_eq!(recipe.calories, Some(480.5));
    }

    #[test]
    fn diet_list_membership_sets_tags() {
        let recipe = recipe_from_search(raw_search(serde_json::json!({
            "id": 1,
            "diets": ["Vegan"]
        })))
        .unwrap();
        assert_eq!(recipe.tags, vec!["Vegan".to_string()]);

        let recipe = recipe_from_search(raw_search(serde_json::json!({
            "id": 2,
            "diets": ["vegetarian", "vegan"]
        })))
        .unwrap();
        assert_eq!(
            recipe.tags,
            vec!["Vegetarian".to_string(), "Vegan".to_string()]
        );
    }

    #[test]
    fn search_result_without_id_is_dropped() {
        assert!(recipe_from_search(raw_search(serde_json::json!({ "title": "Mystery" }))).is_none());
        assert!(recipe_from_search(raw_search(serde_json::json!({ "id": "  " }))).is_none());
    }

    #[test]
    fn zero_ready_time_falls_back_to_default() {
        let recipe = recipe_from_search(raw_search(serde_json::json!({
            "id": 3,
            "readyInMinutes": 0
        })))
        .unwrap();
        assert_eq!(recipe.time, 30);
    }

    #[test]
    fn non_positive_calories_are_discarded() {
        for amount in [0.0, -120.0] {
            let recipe = recipe_from_search(raw_search(serde_json::json!({
                "id": 4,
                "nutrition": { "nutrients": [{ "name": "Calories", "amount": amount }] }
            })))
            .unwrap();
            assert_eq!(recipe.calories, None);
        }
    }

    #[test]
    fn detail_prefers_original_ingredient_line() {
        let detail = detail_from_raw(raw_detail(serde_json::json!({
            "id": 9,
            "title": "Soup",
            "extendedIngredients": [
                { "original": "2 cups vegetable stock", "name": "stock" },
                { "name": "carrot", "amount": 1.0, "unit": "large" },
                { "amount": 0.5, "unit": "tsp" },
                {}
            ]
        })));

        assert_eq!(
            detail.ingredients,
            vec![
                "2 cups vegetable stock".to_string(),
                "carrot".to_string(),
                "0.5 tsp".to_string()
            ]
        );
    }

    #[test]
    fn detail_takes_steps_from_first_instruction_block() {
        let detail = detail_from_raw(raw_detail(serde_json::json!({
            "id": 9,
            "analyzedInstructions": [
                { "steps": [
                    { "step": "Chop the onions." },
                    { "step": "Simmer &amp; stir." }
                ]},
                { "steps": [{ "step": "Ignored second block." }] }
            ]
        })));

        assert_eq!(
            detail.steps,
            vec!["Chop the onions.".to_string(), "Simmer & stir.".to_string()]
        );
    }

    #[test]
    fn detail_without_instructions_has_empty_steps() {
        let detail = detail_from_raw(raw_detail(serde_json::json!({ "id": 9 })));
        assert!(detail.steps.is_empty());
        assert!(detail.ingredients.is_empty());
        assert_eq!(detail.name, None);
    }

    #[test]
    fn strip_html_removes_tags_and_decodes_entities() {
        assert_eq!(
            strip_html("<p>Good &amp; hot</p><br/>soup"),
            "Good & hot soup"
        );
        assert_eq!(strip_html("no markup"), "no markup");
        assert_eq!(strip_html("  spaced\n\nout  "), "spaced out");
    }

    #[test]
    fn id_values_normalize_to_strings() {
        assert_eq!(
            id_string(&Some(serde_json::json!(716429))),
            Some("716429".to_string())
        );
        assert_eq!(
            id_string(&Some(serde_json::json!(" 12 "))),
            Some("12".to_string())
        );
        assert_eq!(id_string(&Some(serde_json::json!(null))), None);
        assert_eq!(id_string(&None), None);
    }
}
