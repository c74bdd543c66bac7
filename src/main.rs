// ============================================================================
// MEALMAP - Terminal Meal Planning Application
// ============================================================================
//
// MODULE STRUCTURE:
// 1. Imports & Constants        - Dependencies and limits
// 2. Shell State                - App struct, overlays, click targets
// 3. Startup                    - Logging, terminal setup, login gate
// 4. Main Loop                  - Event loop and fetch-worker plumbing
// 5. Event Handling             - Keyboard, mouse, UI interactions
// 6. Rendering (Drawing)        - All UI output functions
// 7. Helpers                    - Photo encoding, filtering, layout math
//
// Each section is clearly marked with section headers for easy navigation.
// ============================================================================

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Local, TimeZone};
use crossterm::{
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{GatewayError, RecipeApi, RecipeDetail, RecipeSource};
use crate::config::Config;
use crate::offline::AssetCache;
use crate::state::{
    AppState, CookAdvance, DayKey, FallbackRecipes, MealPhoto, Recipe, Screen,
    fetch_recipes_with_fallback,
};
use crate::store::{LOGGED_IN, Store};

mod api;
mod config;
mod offline;
mod state;
mod store;

const TICK_RATE: Duration = Duration::from_millis(250);
const STATUS_TTL: Duration = Duration::from_millis(3500);
const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024; // 5 MB cap on gallery images

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

struct HelpTopic {
    title: &'static str,
    detail: &'static str,
}

const HELP_TOPICS: &[HelpTopic] = &[
    HelpTopic {
        title: "Navigation",
        detail: "1-5 jump between Home, Browse, Planner, Saved and Gallery. Esc steps back towards Home.",
    },
    HelpTopic {
        title: "Browse",
        detail: "/ focuses the search box, f cycles the tag filter, Enter opens the highlighted recipe, r reloads the collection from the recipe service.",
    },
    HelpTopic {
        title: "Recipe detail",
        detail: "s saves or unsaves the recipe, p puts it on a planner day, Enter starts cooking mode. Arrow keys scroll long recipes.",
    },
    HelpTopic {
        title: "Cooking mode",
        detail: "Right or n moves to the next step, Left or p goes back one. Finishing the last step returns to the recipe.",
    },
    HelpTopic {
        title: "Planner",
        detail: "Left/Right pick a day, Enter opens the day summary with calorie totals, c clears the whole week.",
    },
    HelpTopic {
        title: "Gallery",
        detail: "a adds a photo from an image file on disk, o opens the highlighted photo in your image viewer, x deletes it.",
    },
    HelpTopic {
        title: "Account",
        detail: "Ctrl+L logs out. Saved recipes, the planner and photos stay on this device.",
    },
    HelpTopic {
        title: "Mouse",
        detail: "Nav buttons, list rows, planner day cards and the on-screen buttons are all clickable. The wheel scrolls lists and recipe text.",
    },
];

// ============================================================================
// SHELL STATE
// ============================================================================

enum FetchMsg {
    RecipesLoaded(Result<Vec<Recipe>, GatewayError>),
    DetailsLoaded {
        id: String,
        result: Result<RecipeDetail, GatewayError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrowseFocus {
    Search,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOption {
    All,
    Vegetarian,
    Vegan,
    Quick,
    Budget,
}

impl FilterOption {
    fn label(self) -> &'static str {
        match self {
            FilterOption::All => "All recipes",
            FilterOption::Vegetarian => "Vegetarian",
            FilterOption::Vegan => "Vegan",
            FilterOption::Quick => "Quick",
            FilterOption::Budget => "Budget",
        }
    }

    /// Lowercase tag this option matches against, None for no filtering.
    fn tag(self) -> Option<&'static str> {
        match self {
            FilterOption::All => None,
            FilterOption::Vegetarian => Some("vegetarian"),
            FilterOption::Vegan => Some("vegan"),
            FilterOption::Quick => Some("quick"),
            FilterOption::Budget => Some("budget"),
        }
    }

    fn next(self) -> FilterOption {
        match self {
            FilterOption::All => FilterOption::Vegetarian,
            FilterOption::Vegetarian => FilterOption::Vegan,
            FilterOption::Vegan => FilterOption::Quick,
            FilterOption::Quick => FilterOption::Budget,
            FilterOption::Budget => FilterOption::All,
        }
    }
}

#[derive(Debug, Clone)]
enum PendingConfirm {
    ClearPlanner,
    RemovePlannerItem { day: DayKey, index: usize },
    DeletePhoto { id: String },
    Logout,
}

impl PendingConfirm {
    fn message(&self) -> &'static str {
        match self {
            PendingConfirm::ClearPlanner => "Clear all planned meals for the week?",
            PendingConfirm::RemovePlannerItem { .. } => "Remove this meal from your planner?",
            PendingConfirm::DeletePhoto { .. } => "Delete this photo from your gallery?",
            PendingConfirm::Logout => "Log out of MealMap?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailAction {
    StartCooking,
    ToggleSaved,
    AddToPlanner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CookAction {
    Previous,
    Next,
}

struct App {
    state: AppState,
    source: Arc<dyn RecipeSource>,
    fallback: Arc<FallbackRecipes>,
    fetch_tx: Sender<FetchMsg>,
    fetch_rx: Receiver<FetchMsg>,

    screen: Screen,
    logout_requested: bool,

    recipes_error: Option<String>,
    detail_error: Option<String>,
    detail_scroll: u16,

    browse_query: String,
    browse_filter: FilterOption,
    browse_focus: BrowseFocus,
    browse_list: ListState,
    saved_list: ListState,
    gallery_list: ListState,
    planner_day: usize,

    confirm: Option<PendingConfirm>,
    day_picker: Option<usize>,
    day_summary: Option<DayKey>,
    day_summary_selected: usize,
    photo_prompt: Option<String>,
    show_help: bool,
    help_scroll: u16,
    status: Option<(String, Instant)>,

    // Click targets, rebuilt on every draw
    nav_btns: Vec<(Screen, Rect)>,
    home_btns: Vec<(Screen, Rect)>,
    search_box: Rect,
    filter_box: Rect,
    browse_rects: Vec<(usize, Rect)>,
    saved_rects: Vec<(usize, Rect)>,
    gallery_rects: Vec<(usize, Rect)>,
    day_card_rects: Vec<(DayKey, Rect)>,
    detail_btns: Vec<(DetailAction, Rect)>,
    cook_btns: Vec<(CookAction, Rect)>,
    picker_rects: Vec<(usize, Rect)>,
    summary_rects: Vec<(usize, Rect)>,
}

impl App {
    fn new(state: AppState, source: Arc<dyn RecipeSource>, fallback: Arc<FallbackRecipes>) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel();
        Self {
            state,
            source,
            fallback,
            fetch_tx,
            fetch_rx,
            screen: Screen::Home,
            logout_requested: false,
            recipes_error: None,
            detail_error: None,
            detail_scroll: 0,
            browse_query: String::new(),
            browse_filter: FilterOption::All,
            browse_focus: BrowseFocus::List,
            browse_list: ListState::default(),
            saved_list: ListState::default(),
            gallery_list: ListState::default(),
            planner_day: 0,
            confirm: None,
            day_picker: None,
            day_summary: None,
            day_summary_selected: 0,
            photo_prompt: None,
            show_help: false,
            help_scroll: 0,
            status: None,
            nav_btns: Vec::new(),
            home_btns: Vec::new(),
            search_box: Rect::default(),
            filter_box: Rect::default(),
            browse_rects: Vec::new(),
            saved_rects: Vec::new(),
            gallery_rects: Vec::new(),
            day_card_rects: Vec::new(),
            detail_btns: Vec::new(),
            cook_btns: Vec::new(),
            picker_rects: Vec::new(),
            summary_rects: Vec::new(),
        }
    }

    /// Switches screens, closes overlays and runs the new screen's data
    /// demand. Fetches land asynchronously via the fetch channel.
    fn navigate(&mut self, screen: Screen) {
        self.screen = screen;
        self.confirm = None;
        self.day_picker = None;
        self.day_summary = None;
        self.photo_prompt = None;
        self.show_help = false;

        match screen {
            Screen::Browse | Screen::Planner | Screen::Saved => self.request_recipes(),
            Screen::RecipeDetail => {
                self.detail_error = None;
                self.detail_scroll = 0;
                if let Some(id) = self.state.selected_recipe_id.clone() {
                    self.request_details(&id);
                }
            }
            Screen::Cooking => self.state.reset_cooking(),
            Screen::Home | Screen::Gallery => {}
        }
    }

    /// Kicks the session recipe load if the cache says one is due. The
    /// in-flight marker is set before the worker spawns, so a second call
    /// in the same tick does nothing.
    fn request_recipes(&mut self) {
        if !self.state.begin_recipes_load() {
            return;
        }
        let source = Arc::clone(&self.source);
        let fallback = Arc::clone(&self.fallback);
        let tx = self.fetch_tx.clone();
        thread::spawn(move || {
            let result = fetch_recipes_with_fallback(source.as_ref(), &fallback);
            let _ = tx.send(FetchMsg::RecipesLoaded(result));
        });
    }

    fn reload_recipes(&mut self) {
        if self.state.recipes_loading() {
            self.set_status("Recipes are already loading");
            return;
        }
        self.recipes_error = None;
        self.state.invalidate_recipes();
        self.request_recipes();
        self.set_status("Reloading recipes");
    }

    fn request_details(&mut self, id: &str) {
        if !self.state.begin_details_load(id) {
            return;
        }
        let id = id.to_string();
        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        thread::spawn(move || {
            let result = source.recipe_details(&id);
            let _ = tx.send(FetchMsg::DetailsLoaded { id, result });
        });
    }

    /// Drains completed fetches into the state cache. Stale detail results
    /// merge silently; only the screen currently showing the id gets its
    /// error state updated.
    fn poll_fetch(&mut self) {
        while let Ok(msg) = self.fetch_rx.try_recv() {
            match msg {
                FetchMsg::RecipesLoaded(result) => {
                    self.recipes_error = result.as_ref().err().map(|_| {
                        "Unable to load recipes right now. Please check your connection or try again later."
                            .to_string()
                    });
                    self.state.finish_recipes_load(result);
                }
                FetchMsg::DetailsLoaded { id, result } => {
                    let showing = self.state.selected_recipe_id.as_deref() == Some(id.as_str());
                    match self.state.finish_details_load(&id, result) {
                        Ok(()) => {
                            if showing {
                                self.detail_error = None;
                            }
                        }
                        Err(err) => {
                            if showing {
                                self.detail_error = Some(match err {
                                    GatewayError::NotFound(_) => "Recipe not found.".to_string(),
                                    _ => "Sorry, we couldn't load this recipe right now."
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    fn apply_confirm(&mut self, pending: PendingConfirm) {
        match pending {
            PendingConfirm::ClearPlanner => {
                self.state.clear_planner();
                self.set_status("Planner cleared");
            }
            PendingConfirm::RemovePlannerItem { day, index } => {
                self.state.remove_from_planner(day, index);
                self.set_status("Meal removed from planner");
            }
            PendingConfirm::DeletePhoto { id } => {
                self.state.remove_photo(&id);
                self.set_status("Photo deleted");
            }
            PendingConfirm::Logout => {
                self.logout_requested = true;
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    /// Recipe indices visible on the browse screen under the current
    /// query and filter.
    fn browse_match_indices(&self) -> Vec<usize> {
        self.state
            .recipes
            .iter()
            .enumerate()
            .filter(|(_, r)| recipe_matches(r, &self.browse_query, self.browse_filter))
            .map(|(i, _)| i)
            .collect()
    }

    /// Recipe indices of saved recipes, in collection order.
    fn saved_match_indices(&self) -> Vec<usize> {
        self.state
            .recipes
            .iter()
            .enumerate()
            .filter(|(_, r)| self.state.is_saved(&r.id))
            .map(|(i, _)| i)
            .collect()
    }

    fn open_recipe_by_index(&mut self, recipe_index: usize) {
        if let Some(recipe) = self.state.recipes.get(recipe_index) {
            let id = recipe.id.clone();
            self.state.select_recipe(&id);
            self.navigate(Screen::RecipeDetail);
        }
    }

    /// Clamps every selection against its collection before drawing, the
    /// same guard the load and merge paths apply after mutation.
    fn validate_selections(&mut self) {
        let browse_len = self.browse_match_indices().len();
        clamp_list(&mut self.browse_list, browse_len);
        let saved_len = self.saved_match_indices().len();
        clamp_list(&mut self.saved_list, saved_len);
        clamp_list(&mut self.gallery_list, self.state.meal_photos.len());

        if self.planner_day >= DayKey::ALL.len() {
            self.planner_day = DayKey::ALL.len() - 1;
        }
        if let Some(sel) = self.day_picker {
            if sel >= DayKey::ALL.len() {
                self.day_picker = Some(DayKey::ALL.len() - 1);
            }
        }
        if let Some(day) = self.day_summary {
            let len = self.state.planner.day(day).len();
            if self.day_summary_selected >= len {
                self.day_summary_selected = len.saturating_sub(1);
            }
        }
        self.state.clamp_cooking_step();

        if let Some((_, at)) = &self.status {
            if at.elapsed() > STATUS_TTL {
                self.status = None;
            }
        }
    }
}

// ============================================================================
// STARTUP
// ============================================================================

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
    }
}

fn run() -> Result<()> {
    let config = Config::load();
    let data_dir = config
        .data_dir()
        .context("could not determine data directory")?;
    fs::create_dir_all(&data_dir)?;
    init_logging(&data_dir)?;
    info!(version = env!("CARGO_PKG_VERSION"), "mealmap starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, event::EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &config, &data_dir);

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        event::DisableMouseCapture
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

/// Log lines go to a file under the data dir; the terminal stays clean
/// while the alternate screen is up.
fn init_logging(data_dir: &Path) -> Result<()> {
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("mealmap.log"))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mealmap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    data_dir: &Path,
) -> Result<()> {
    let session = Store::open(data_dir)?;

    loop {
        // Login gate: nothing else is constructed until it passes.
        let logged_in: bool = session.load(LOGGED_IN);
        if !logged_in {
            match run_login(terminal, config, &session)? {
                LoginOutcome::LoggedIn => {}
                LoginOutcome::Quit => return Ok(()),
            }
        }

        let assets = Arc::new(AssetCache::open(data_dir)?);
        assets.seed();
        let source: Arc<dyn RecipeSource> = Arc::new(RecipeApi::new(
            Arc::clone(&assets),
            config.api_base.clone(),
            config.api_key.clone(),
        ));
        let fallback = Arc::new(match &config.recipes_file {
            Some(path) => FallbackRecipes::from_file(path.clone()),
            None => FallbackRecipes::from_cache(Arc::clone(&assets)),
        });

        let store = Store::open(data_dir)?;
        let mut app = App::new(AppState::load(store), source, fallback);
        app.navigate(Screen::from_name(&config.start_screen));

        match run_shell(terminal, &mut app)? {
            ShellOutcome::Quit => return Ok(()),
            ShellOutcome::Logout => {
                session.remove(LOGGED_IN);
                info!("logged out");
            }
        }
    }
}

// ===== Login gate =====

enum LoginOutcome {
    LoggedIn,
    Quit,
}

struct LoginForm {
    email: String,
    password: String,
    focus_password: bool,
    error: Option<String>,
}

fn run_login(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    session: &Store,
) -> Result<LoginOutcome> {
    let mut form = LoginForm {
        email: String::new(),
        password: String::new(),
        focus_password: false,
        error: None,
    };

    loop {
        terminal.draw(|frame| draw_login(frame, &form, config))?;

        if !event::poll(TICK_RATE)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(LoginOutcome::Quit);
        }
        match key.code {
            KeyCode::Esc => return Ok(LoginOutcome::Quit),
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
                form.focus_password = !form.focus_password;
            }
            KeyCode::Enter => {
                if form.email.trim() == config.login_email && form.password == config.login_password
                {
                    session.save(LOGGED_IN, &true);
                    info!("login succeeded");
                    return Ok(LoginOutcome::LoggedIn);
                }
                warn!("login attempt rejected");
                form.error = Some("Invalid email or password.".to_string());
                form.password.clear();
            }
            KeyCode::Backspace => {
                if form.focus_password {
                    form.password.pop();
                } else {
                    form.email.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if form.focus_password {
                    form.password.push(c);
                } else {
                    form.email.push(c);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// MAIN LOOP
// ============================================================================

enum ShellOutcome {
    Quit,
    Logout,
}

fn run_shell(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<ShellOutcome> {
    let mut last_tick = Instant::now();

    loop {
        app.poll_fetch();
        terminal.draw(|frame| draw(frame, app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(app, key) {
                        return Ok(ShellOutcome::Quit);
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                Event::Resize(_, _) => {}
                _ => {}
            }
            if app.logout_requested {
                return Ok(ShellOutcome::Logout);
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

// ============================================================================
// EVENT HANDLING - KEYBOARD
// ============================================================================

/// Returns true when the app should quit. Overlays swallow keys first,
/// then global shortcuts, then the current screen.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    // Confirmation dialog swallows everything until answered
    if let Some(pending) = app.confirm.clone() {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.confirm = None;
                app.apply_confirm(pending);
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                app.confirm = None;
            }
            _ => {}
        }
        return false;
    }

    if app.photo_prompt.is_some() {
        handle_photo_prompt_key(app, key);
        return false;
    }
    if app.day_picker.is_some() {
        handle_day_picker_key(app, key);
        return false;
    }
    if app.day_summary.is_some() {
        handle_day_summary_key(app, key);
        return false;
    }
    if app.show_help {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') => {
                app.show_help = false;
                app.help_scroll = 0;
            }
            KeyCode::Up => app.help_scroll = app.help_scroll.saturating_sub(1),
            KeyCode::Down => app.help_scroll = app.help_scroll.saturating_add(1),
            _ => {}
        }
        return false;
    }

    if key.code == KeyCode::Char('l') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.confirm = Some(PendingConfirm::Logout);
        return false;
    }

    // Search capture takes the raw characters
    if app.screen == Screen::Browse && app.browse_focus == BrowseFocus::Search {
        handle_browse_search_key(app, key);
        return false;
    }

    match key.code {
        KeyCode::Char('?') => {
            app.show_help = true;
            app.help_scroll = 0;
            return false;
        }
        KeyCode::Char('1') => {
            app.navigate(Screen::Home);
            return false;
        }
        KeyCode::Char('2') => {
            app.navigate(Screen::Browse);
            return false;
        }
        KeyCode::Char('3') => {
            app.navigate(Screen::Planner);
            return false;
        }
        KeyCode::Char('4') => {
            app.navigate(Screen::Saved);
            return false;
        }
        KeyCode::Char('5') => {
            app.navigate(Screen::Gallery);
            return false;
        }
        _ => {}
    }

    match app.screen {
        Screen::Home => handle_home_key(app, key),
        Screen::Browse => handle_browse_key(app, key),
        Screen::Planner => handle_planner_key(app, key),
        Screen::Saved => handle_saved_key(app, key),
        Screen::Gallery => handle_gallery_key(app, key),
        Screen::RecipeDetail => handle_detail_key(app, key),
        Screen::Cooking => handle_cooking_key(app, key),
    }
    false
}

fn handle_home_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('b') | KeyCode::Enter => app.navigate(Screen::Browse),
        KeyCode::Char('p') => app.navigate(Screen::Planner),
        _ => {}
    }
}

fn handle_browse_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Down => {
            app.browse_focus = BrowseFocus::List;
        }
        KeyCode::Backspace => {
            app.browse_query.pop();
            app.browse_list.select(Some(0));
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.browse_query.push(c);
            app.browse_list.select(Some(0));
        }
        _ => {}
    }
}

fn handle_browse_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('/') => app.browse_focus = BrowseFocus::Search,
        KeyCode::Char('f') => {
            app.browse_filter = app.browse_filter.next();
            app.browse_list.select(Some(0));
        }
        KeyCode::Char('r') => app.reload_recipes(),
        KeyCode::Up => {
            let len = app.browse_match_indices().len();
            list_nav(&mut app.browse_list, len, -1);
        }
        KeyCode::Down => {
            let len = app.browse_match_indices().len();
            list_nav(&mut app.browse_list, len, 1);
        }
        KeyCode::Enter => {
            let matches = app.browse_match_indices();
            if let Some(pos) = app.browse_list.selected() {
                if let Some(&recipe_index) = matches.get(pos) {
                    app.open_recipe_by_index(recipe_index);
                }
            }
        }
        KeyCode::Esc => app.navigate(Screen::Home),
        _ => {}
    }
}

fn handle_planner_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Up => {
            app.planner_day = (app.planner_day + DayKey::ALL.len() - 1) % DayKey::ALL.len();
        }
        KeyCode::Right | KeyCode::Down => {
            app.planner_day = (app.planner_day + 1) % DayKey::ALL.len();
        }
        KeyCode::Enter => {
            app.day_summary = Some(DayKey::ALL[app.planner_day]);
            app.day_summary_selected = 0;
        }
        KeyCode::Char('c') => {
            app.confirm = Some(PendingConfirm::ClearPlanner);
        }
        KeyCode::Char('r') => app.reload_recipes(),
        KeyCode::Esc => app.navigate(Screen::Home),
        _ => {}
    }
}

fn handle_saved_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => {
            let len = app.saved_match_indices().len();
            list_nav(&mut app.saved_list, len, -1);
        }
        KeyCode::Down => {
            let len = app.saved_match_indices().len();
            list_nav(&mut app.saved_list, len, 1);
        }
        KeyCode::Enter => {
            let matches = app.saved_match_indices();
            if let Some(pos) = app.saved_list.selected() {
                if let Some(&recipe_index) = matches.get(pos) {
                    app.open_recipe_by_index(recipe_index);
                }
            }
        }
        KeyCode::Char('r') => app.reload_recipes(),
        KeyCode::Esc => app.navigate(Screen::Home),
        _ => {}
    }
}

fn handle_gallery_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => list_nav(&mut app.gallery_list, app.state.meal_photos.len(), -1),
        KeyCode::Down => list_nav(&mut app.gallery_list, app.state.meal_photos.len(), 1),
        KeyCode::Char('a') => app.photo_prompt = Some(String::new()),
        KeyCode::Char('o') => {
            if let Some(photo) = app
                .gallery_list
                .selected()
                .and_then(|i| app.state.meal_photos.get(i))
            {
                match export_photo(photo) {
                    Ok(path) => {
                        if open::that(&path).is_ok() {
                            app.set_status("Photo opened in image viewer");
                        } else {
                            app.set_status("Could not open an image viewer");
                        }
                    }
                    Err(msg) => app.set_status(msg),
                }
            }
        }
        KeyCode::Char('x') | KeyCode::Delete => {
            if let Some(photo) = app
                .gallery_list
                .selected()
                .and_then(|i| app.state.meal_photos.get(i))
            {
                app.confirm = Some(PendingConfirm::DeletePhoto {
                    id: photo.id.clone(),
                });
            }
        }
        KeyCode::Esc => app.navigate(Screen::Home),
        _ => {}
    }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('s') => {
            if let Some(id) = app.state.selected_recipe_id.clone() {
                app.state.toggle_saved(&id);
                if app.state.is_saved(&id) {
                    app.set_status("Recipe saved");
                } else {
                    app.set_status("Removed from saved recipes");
                }
            }
        }
        KeyCode::Char('p') => {
            if app.state.selected_recipe().is_some() {
                app.day_picker = Some(0);
            }
        }
        KeyCode::Enter => {
            if app.state.selected_recipe().is_some() {
                app.navigate(Screen::Cooking);
            }
        }
        KeyCode::Char('r') => {
            if let Some(id) = app.state.selected_recipe_id.clone() {
                app.detail_error = None;
                app.request_details(&id);
            }
        }
        KeyCode::Up => app.detail_scroll = app.detail_scroll.saturating_sub(1),
        KeyCode::Down => app.detail_scroll = app.detail_scroll.saturating_add(1),
        KeyCode::Esc => app.navigate(Screen::Browse),
        _ => {}
    }
}

fn handle_cooking_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Right | KeyCode::Char('n') | KeyCode::Enter => {
            if app.state.advance_cooking_step() == CookAdvance::Finished {
                app.navigate(Screen::RecipeDetail);
            }
        }
        KeyCode::Left | KeyCode::Char('p') => app.state.previous_cooking_step(),
        KeyCode::Esc => app.navigate(Screen::RecipeDetail),
        _ => {}
    }
}

fn handle_photo_prompt_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.photo_prompt = None,
        KeyCode::Enter => {
            if let Some(prompt) = app.photo_prompt.take() {
                let path = prompt.trim().to_string();
                if path.is_empty() {
                    return;
                }
                match photo_data_url_from_file(Path::new(&path)) {
                    Ok(data_url) => {
                        app.state.add_photo(data_url);
                        let last = app.state.meal_photos.len().saturating_sub(1);
                        app.gallery_list.select(Some(last));
                        app.set_status("Photo added to gallery");
                    }
                    Err(msg) => app.set_status(msg),
                }
            }
        }
        KeyCode::Backspace => {
            if let Some(prompt) = app.photo_prompt.as_mut() {
                prompt.pop();
            }
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(prompt) = app.photo_prompt.as_mut() {
                prompt.push(c);
            }
        }
        _ => {}
    }
}

fn handle_day_picker_key(app: &mut App, key: KeyEvent) {
    let Some(selected) = app.day_picker else {
        return;
    };
    match key.code {
        KeyCode::Up => {
            app.day_picker = Some((selected + DayKey::ALL.len() - 1) % DayKey::ALL.len());
        }
        KeyCode::Down => {
            app.day_picker = Some((selected + 1) % DayKey::ALL.len());
        }
        KeyCode::Enter => {
            app.day_picker = None;
            let day = DayKey::ALL[selected.min(DayKey::ALL.len() - 1)];
            if let Some(id) = app.state.selected_recipe_id.clone() {
                app.state.add_to_planner(day, &id);
                app.set_status(format!("Added to {}", day.label()));
            }
        }
        KeyCode::Esc => app.day_picker = None,
        _ => {}
    }
}

fn handle_day_summary_key(app: &mut App, key: KeyEvent) {
    let Some(day) = app.day_summary else {
        return;
    };
    let len = app.state.planner.day(day).len();
    match key.code {
        KeyCode::Up => app.day_summary_selected = app.day_summary_selected.saturating_sub(1),
        KeyCode::Down => {
            if app.day_summary_selected + 1 < len {
                app.day_summary_selected += 1;
            }
        }
        KeyCode::Char('x') | KeyCode::Delete => {
            if len > 0 {
                app.confirm = Some(PendingConfirm::RemovePlannerItem {
                    day,
                    index: app.day_summary_selected,
                });
            }
        }
        KeyCode::Esc | KeyCode::Enter => app.day_summary = None,
        _ => {}
    }
}

// ============================================================================
// EVENT HANDLING - MOUSE
// ============================================================================

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => handle_mouse_left(app, mouse),
        MouseEventKind::ScrollUp => handle_mouse_scroll(app, -3),
        MouseEventKind::ScrollDown => handle_mouse_scroll(app, 3),
        _ => {}
    }
}

fn handle_mouse_left(app: &mut App, mouse: MouseEvent) {
    // Keyboard-only dialogs
    if app.confirm.is_some() || app.photo_prompt.is_some() {
        return;
    }
    if app.show_help {
        app.show_help = false;
        return;
    }
    if app.day_picker.is_some() {
        if let Some(idx) = find_clicked_item(mouse, &app.picker_rects.clone()) {
            app.day_picker = None;
            let day = DayKey::ALL[idx.min(DayKey::ALL.len() - 1)];
            if let Some(id) = app.state.selected_recipe_id.clone() {
                app.state.add_to_planner(day, &id);
                app.set_status(format!("Added to {}", day.label()));
            }
        } else {
            // Click outside the popup closes it
            app.day_picker = None;
        }
        return;
    }
    if app.day_summary.is_some() {
        if let Some(idx) = find_clicked_item(mouse, &app.summary_rects.clone()) {
            app.day_summary_selected = idx;
        } else {
            app.day_summary = None;
        }
        return;
    }

    // Nav bar
    for (screen, rect) in app.nav_btns.clone() {
        if inside_rect(mouse, rect) {
            app.navigate(screen);
            return;
        }
    }

    match app.screen {
        Screen::Home => {
            for (screen, rect) in app.home_btns.clone() {
                if inside_rect(mouse, rect) {
                    app.navigate(screen);
                    return;
                }
            }
        }
        Screen::Browse => handle_browse_mouse_left(app, mouse),
        Screen::Planner => {
            for (day, rect) in app.day_card_rects.clone() {
                if inside_rect(mouse, rect) {
                    if let Some(pos) = DayKey::ALL.iter().position(|d| *d == day) {
                        app.planner_day = pos;
                    }
                    app.day_summary = Some(day);
                    app.day_summary_selected = 0;
                    return;
                }
            }
        }
        Screen::Saved => {
            if let Some(pos) = find_clicked_item(mouse, &app.saved_rects.clone()) {
                app.saved_list.select(Some(pos));
                let matches = app.saved_match_indices();
                if let Some(&recipe_index) = matches.get(pos) {
                    app.open_recipe_by_index(recipe_index);
                }
            }
        }
        Screen::Gallery => {
            if let Some(pos) = find_clicked_item(mouse, &app.gallery_rects.clone()) {
                app.gallery_list.select(Some(pos));
            }
        }
        Screen::RecipeDetail => {
            for (action, rect) in app.detail_btns.clone() {
                if inside_rect(mouse, rect) {
                    match action {
                        DetailAction::StartCooking => {
                            handle_detail_key(app, KeyEvent::from(KeyCode::Enter))
                        }
                        DetailAction::ToggleSaved => {
                            handle_detail_key(app, KeyEvent::from(KeyCode::Char('s')))
                        }
                        DetailAction::AddToPlanner => {
                            handle_detail_key(app, KeyEvent::from(KeyCode::Char('p')))
                        }
                    }
                    return;
                }
            }
        }
        Screen::Cooking => {
            for (action, rect) in app.cook_btns.clone() {
                if inside_rect(mouse, rect) {
                    match action {
                        CookAction::Previous => app.state.previous_cooking_step(),
                        CookAction::Next => {
                            if app.state.advance_cooking_step() == CookAdvance::Finished {
                                app.navigate(Screen::RecipeDetail);
                            }
                        }
                    }
                    return;
                }
            }
        }
    }
}

fn handle_browse_mouse_left(app: &mut App, mouse: MouseEvent) {
    if inside_rect(mouse, app.search_box) {
        app.browse_focus = BrowseFocus::Search;
        return;
    }
    if inside_rect(mouse, app.filter_box) {
        app.browse_filter = app.browse_filter.next();
        app.browse_list.select(Some(0));
        return;
    }
    if let Some(pos) = find_clicked_item(mouse, &app.browse_rects.clone()) {
        app.browse_focus = BrowseFocus::List;
        app.browse_list.select(Some(pos));
        let matches = app.browse_match_indices();
        if let Some(&recipe_index) = matches.get(pos) {
            app.open_recipe_by_index(recipe_index);
        }
    }
}

fn handle_mouse_scroll(app: &mut App, delta: i64) {
    if app.show_help {
        if delta < 0 {
            app.help_scroll = app.help_scroll.saturating_sub(3);
        } else {
            app.help_scroll = app.help_scroll.saturating_add(3);
        }
        return;
    }
    match app.screen {
        Screen::Browse => {
            let len = app.browse_match_indices().len();
            list_nav(&mut app.browse_list, len, delta.signum());
        }
        Screen::Saved => {
            let len = app.saved_match_indices().len();
            list_nav(&mut app.saved_list, len, delta.signum());
        }
        Screen::Gallery => {
            let len = app.state.meal_photos.len();
            list_nav(&mut app.gallery_list, len, delta.signum());
        }
        Screen::RecipeDetail => {
            if delta < 0 {
                app.detail_scroll = app.detail_scroll.saturating_sub(3);
            } else {
                app.detail_scroll = app.detail_scroll.saturating_add(3);
            }
        }
        _ => {}
    }
}

// ============================================================================
// RENDERING (DRAWING)
// ============================================================================

fn draw(frame: &mut ratatui::Frame, app: &mut App) {
    app.validate_selections();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    draw_nav(frame, app, chunks[0]);

    match app.screen {
        Screen::Home => draw_home(frame, app, chunks[1]),
        Screen::Browse => draw_browse(frame, app, chunks[1]),
        Screen::Planner => draw_planner(frame, app, chunks[1]),
        Screen::Saved => draw_saved(frame, app, chunks[1]),
        Screen::Gallery => draw_gallery(frame, app, chunks[1]),
        Screen::RecipeDetail => draw_recipe_detail(frame, app, chunks[1]),
        Screen::Cooking => draw_cooking(frame, app, chunks[1]),
    }

    draw_footer(frame, app, chunks[2]);

    if app.day_summary.is_some() {
        draw_day_summary_popup(frame, app);
    }
    if app.day_picker.is_some() {
        draw_day_picker_popup(frame, app);
    }
    if app.photo_prompt.is_some() {
        draw_photo_prompt(frame, app);
    }
    if app.show_help {
        draw_help_overlay(frame, app);
    }
    if app.confirm.is_some() {
        draw_confirm_popup(frame, app);
    }
}

fn draw_nav(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ])
        .split(area);

    app.nav_btns.clear();

    let home_style = if matches!(app.screen, Screen::Home) {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let home_btn = Paragraph::new("Home (1)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(home_style);
    app.nav_btns.push((Screen::Home, chunks[0]));
    frame.render_widget(home_btn, chunks[0]);

    let browse_style = if matches!(app.screen, Screen::Browse) {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };
    let browse_btn = Paragraph::new("Browse (2)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(browse_style);
    app.nav_btns.push((Screen::Browse, chunks[1]));
    frame.render_widget(browse_btn, chunks[1]);

    let planner_style = if matches!(app.screen, Screen::Planner) {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let planner_btn = Paragraph::new("Planner (3)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(planner_style);
    app.nav_btns.push((Screen::Planner, chunks[2]));
    frame.render_widget(planner_btn, chunks[2]);

    let saved_style = if matches!(app.screen, Screen::Saved) {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Magenta)
    };
    let saved_btn = Paragraph::new("Saved (4)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(saved_style);
    app.nav_btns.push((Screen::Saved, chunks[3]));
    frame.render_widget(saved_btn, chunks[3]);

    let gallery_style = if matches!(app.screen, Screen::Gallery) {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::LightBlue)
    };
    let gallery_btn = Paragraph::new("Gallery (5)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(gallery_style);
    app.nav_btns.push((Screen::Gallery, chunks[4]));
    frame.render_widget(gallery_btn, chunks[4]);
}

fn draw_home(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome to MealMap",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Plan simple, healthy meals, save money, and avoid last-minute takeaways."),
        Line::from(""),
        Line::from(Span::styled(
            "Quick start",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("  - Browse student-friendly recipes"),
        Line::from("  - Plan meals across your week"),
        Line::from("  - Save favourites and track your cooking"),
        Line::from(""),
        Line::from(format!(
            "Saved recipes: {}   Planned meals: {}   Photos: {}",
            app.state.saved_recipe_ids.len(),
            app.state.planner.planned_count(),
            app.state.meal_photos.len()
        )),
    ];
    if !app.state.recipes_loaded {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "The recipe list loads the first time you open Browse, Planner or Saved.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let body = Paragraph::new(lines)
        .block(Block::default().title("MealMap").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, chunks[0]);

    // Two quick-start buttons
    app.home_btns.clear();
    let buttons = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let browse_btn = Paragraph::new("Browse Recipes")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Green));
    app.home_btns.push((Screen::Browse, buttons[0]));
    frame.render_widget(browse_btn, buttons[0]);
    let planner_btn = Paragraph::new("Open Meal Planner")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow));
    app.home_btns.push((Screen::Planner, buttons[1]));
    frame.render_widget(planner_btn, buttons[1]);
}

fn draw_browse(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let controls = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[0]);

    let search_active = app.browse_focus == BrowseFocus::Search;
    let search_text = if search_active {
        format!("{}_", app.browse_query)
    } else if app.browse_query.is_empty() {
        "Search recipes".to_string()
    } else {
        app.browse_query.clone()
    };
    let search_style = if search_active {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else if app.browse_query.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };
    let search_widget = Paragraph::new(search_text)
        .block(Block::default().title("Search (/)").borders(Borders::ALL))
        .style(search_style);
    app.search_box = controls[0];
    frame.render_widget(search_widget, controls[0]);

    let filter_widget = Paragraph::new(app.browse_filter.label())
        .block(Block::default().title("Filter (f)").borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Cyan));
    app.filter_box = controls[1];
    frame.render_widget(filter_widget, controls[1]);

    let list_area = chunks[1];
    app.browse_rects.clear();

    if app.state.recipes.is_empty() {
        let message = if app.state.recipes_loading() {
            "Loading recipes..."
        } else if let Some(err) = &app.recipes_error {
            err.as_str()
        } else {
            "No recipes loaded yet. Press r to fetch them."
        };
        let para = Paragraph::new(message)
            .block(Block::default().title("Recipes").borders(Borders::ALL))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, list_area);
        return;
    }

    let matches = app.browse_match_indices();
    if matches.is_empty() {
        let para = Paragraph::new("No recipes match your search or filters.")
            .block(Block::default().title("Recipes").borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, list_area);
        return;
    }

    let items: Vec<ListItem> = matches
        .iter()
        .filter_map(|&i| app.state.recipes.get(i))
        .map(|r| ListItem::new(recipe_row(r, app.state.is_saved(&r.id))))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Recipes ({})", matches.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, list_area, &mut app.browse_list);
    register_row_rects(
        &mut app.browse_rects,
        &app.browse_list,
        matches.len(),
        list_area,
    );
}

fn draw_saved(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    app.saved_rects.clear();

    if app.state.saved_recipe_ids.is_empty() {
        let para = Paragraph::new(
            "You don't have any saved recipes yet. Browse recipes and save the ones you like.",
        )
        .block(
            Block::default()
                .title("My Saved Recipes")
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    }

    if app.state.recipes.is_empty() && app.state.recipes_loading() {
        let para = Paragraph::new("Loading saved recipes...")
            .block(
                Block::default()
                    .title("My Saved Recipes")
                    .borders(Borders::ALL),
            )
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    }

    let matches = app.saved_match_indices();
    if matches.is_empty() {
        let para = Paragraph::new(
            "Your saved recipes could not be matched against the collection. Press r to reload recipes.",
        )
        .block(
            Block::default()
                .title("My Saved Recipes")
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    }

    let items: Vec<ListItem> = matches
        .iter()
        .filter_map(|&i| app.state.recipes.get(i))
        .map(|r| ListItem::new(recipe_row(r, true)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("My Saved Recipes ({})", matches.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut app.saved_list);
    register_row_rects(&mut app.saved_rects, &app.saved_list, matches.len(), area);
}

fn draw_planner(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let cards = split_equal_horizontal(area, DayKey::ALL.len());
    app.day_card_rects.clear();

    for (i, day) in DayKey::ALL.iter().enumerate() {
        let selected = i == app.planner_day;
        let ids = app.state.planner.day(*day).clone();

        let mut lines: Vec<Line> = Vec::new();
        if ids.is_empty() {
            lines.push(Line::from(Span::styled(
                "No meal planned",
                Style::default().fg(Color::DarkGray),
            )));
        } else {
            for id in &ids {
                // Names resolve once the collection is loaded
                if let Some(recipe) = app.state.recipe(id) {
                    lines.push(Line::from(recipe.name.clone()));
                }
            }
            if lines.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("{} planned", ids.len()),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }

        let border_style = if selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let card = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(day.label())
                    .borders(Borders::ALL)
                    .border_style(border_style),
            )
            .wrap(Wrap { trim: true });
        if let Some(rect) = cards.get(i) {
            app.day_card_rects.push((*day, *rect));
            frame.render_widget(card, *rect);
        }
    }
}

fn draw_gallery(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    app.gallery_rects.clear();

    if app.state.meal_photos.is_empty() {
        let para = Paragraph::new(
            "No photos yet. Press a to add one from an image file on disk.\n\nPhotos are stored locally on this device and are not uploaded anywhere.",
        )
        .block(Block::default().title("My Gallery").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    }

    let items: Vec<ListItem> = app
        .state
        .meal_photos
        .iter()
        .map(|p| ListItem::new(photo_row(p)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("My Gallery ({})", app.state.meal_photos.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut app.gallery_list);
    register_row_rects(
        &mut app.gallery_rects,
        &app.gallery_list,
        app.state.meal_photos.len(),
        area,
    );
}

fn draw_recipe_detail(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    app.detail_btns.clear();

    let Some(id) = app.state.selected_recipe_id.clone() else {
        let para = Paragraph::new("No recipe selected. Pick one from Browse or Saved.")
            .block(Block::default().title("Recipe").borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    };

    if let Some(err) = &app.detail_error {
        let para = Paragraph::new(format!("{err}\n\nPress r to retry or Esc to go back."))
            .block(Block::default().title("Recipe").borders(Borders::ALL))
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Red));
        frame.render_widget(para, area);
        return;
    }

    let Some(recipe) = app.state.recipe(&id).cloned() else {
        let para = Paragraph::new("Loading recipe details...")
            .block(Block::default().title("Recipe").borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    // Header: name, meta line, calories
    let mut meta = format!("{} mins - {}", recipe.time, recipe.difficulty);
    if !recipe.tags.is_empty() {
        meta.push_str(" - ");
        meta.push_str(&recipe.tags.join(", "));
    }
    let calories_text = match recipe.calories {
        Some(c) => format!("Calories: {c:.0} kcal"),
        None => "Calories: ?".to_string(),
    };
    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            recipe.name.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(meta),
        Line::from(Span::styled(
            calories_text,
            Style::default().fg(Color::Cyan),
        )),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    // Action buttons
    let buttons = split_equal_horizontal(chunks[1], 3);
    let cook_btn = Paragraph::new("Start cooking (Enter)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Green));
    if let Some(rect) = buttons.first() {
        app.detail_btns.push((DetailAction::StartCooking, *rect));
        frame.render_widget(cook_btn, *rect);
    }
    let save_label = if app.state.is_saved(&recipe.id) {
        "Unsave recipe (s)"
    } else {
        "Save recipe (s)"
    };
    let save_btn = Paragraph::new(save_label)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Magenta));
    if let Some(rect) = buttons.get(1) {
        app.detail_btns.push((DetailAction::ToggleSaved, *rect));
        frame.render_widget(save_btn, *rect);
    }
    let plan_btn = Paragraph::new("Add to planner (p)")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow));
    if let Some(rect) = buttons.get(2) {
        app.detail_btns.push((DetailAction::AddToPlanner, *rect));
        frame.render_widget(plan_btn, *rect);
    }

    // Ingredients and steps
    let loading = app.state.is_detail_loading(&id);
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        "Ingredients",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if recipe.ingredients.is_empty() {
        lines.push(Line::from(Span::styled(
            if loading {
                "Loading ingredients..."
            } else {
                "No ingredients available."
            },
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        for item in &recipe.ingredients {
            lines.push(Line::from(format!("  - {item}")));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Steps",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if recipe.steps.is_empty() {
        lines.push(Line::from(Span::styled(
            if loading {
                "Loading steps..."
            } else {
                "No steps available."
            },
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        for (i, step) in recipe.steps.iter().enumerate() {
            lines.push(Line::from(format!("  {}. {step}", i + 1)));
        }
    }

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    frame.render_widget(body, chunks[2]);
}

fn draw_cooking(frame: &mut ratatui::Frame, app: &mut App, area: Rect) {
    app.cook_btns.clear();

    let recipe = app
        .state
        .selected_recipe_id
        .clone()
        .and_then(|id| app.state.recipe(&id).cloned());
    let Some(recipe) = recipe else {
        let para = Paragraph::new("No recipe selected for cooking.")
            .block(Block::default().title("Cooking").borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    };

    if recipe.steps.is_empty() {
        let para = Paragraph::new(
            "This recipe has no steps defined.\n\nPress Esc to go back to the recipe.",
        )
        .block(Block::default().title("Cooking").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(para, area);
        return;
    }

    let total = recipe.steps.len();
    let index = app.state.cooking_step_index.min(total - 1);
    let is_first = index == 0;
    let is_last = index == total - 1;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    let header = Paragraph::new(vec![Line::from(Span::styled(
        format!("Cooking: {}", recipe.name),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))])
    .block(
        Block::default()
            .title(format!("Step {} of {}", index + 1, total))
            .borders(Borders::ALL),
    );
    frame.render_widget(header, chunks[0]);

    let step_text = recipe.steps.get(index).cloned().unwrap_or_default();
    let step_box = Paragraph::new(step_text)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Left)
        .style(Style::default().fg(Color::White));
    frame.render_widget(step_box, chunks[1]);

    let buttons = split_equal_horizontal(chunks[2], 2);
    let prev_style = if is_first {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let prev_btn = Paragraph::new("Previous")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(prev_style);
    if let Some(rect) = buttons.first() {
        app.cook_btns.push((CookAction::Previous, *rect));
        frame.render_widget(prev_btn, *rect);
    }
    let next_label = if is_last { "Done" } else { "Next step" };
    let next_btn = Paragraph::new(next_label)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );
    if let Some(rect) = buttons.get(1) {
        app.cook_btns.push((CookAction::Next, *rect));
        frame.render_widget(next_btn, *rect);
    }
}

fn draw_footer(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let (text, style) = match &app.status {
        Some((msg, _)) => (msg.clone(), Style::default().fg(Color::Green)),
        None => (footer_hint(app), Style::default().fg(Color::DarkGray)),
    };
    let footer = Paragraph::new(text).style(style);
    frame.render_widget(footer, area);
}

fn footer_hint(app: &App) -> String {
    match app.screen {
        Screen::Home => "b browse - p planner - 1-5 screens - ? help - Ctrl+L logout - Ctrl+C quit",
        Screen::Browse => "/ search - f filter - Enter open - r reload - ? help",
        Screen::Planner => "Left/Right pick day - Enter day summary - c clear week - ? help",
        Screen::Saved => "Enter open - r reload - ? help",
        Screen::Gallery => "a add photo - o open - x delete - ? help",
        Screen::RecipeDetail => "s save - p plan - Enter cook - Up/Down scroll - Esc back",
        Screen::Cooking => "Right/n next - Left/p previous - Esc back to recipe",
    }
    .to_string()
}

// ===== Popups =====

fn draw_confirm_popup(frame: &mut ratatui::Frame, app: &App) {
    let Some(pending) = &app.confirm else {
        return;
    };
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 54, 28);

    let block = Block::default()
        .title("[?] Confirm")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Yellow).bg(Color::Black));

    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .split(inner);

    let para = Paragraph::new(pending.message())
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White));
    frame.render_widget(para, chunks[0]);

    let hint = Paragraph::new("Enter/y confirm - Esc/n cancel")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray).italic());
    frame.render_widget(hint, chunks[1]);
}

fn draw_day_picker_popup(frame: &mut ratatui::Frame, app: &mut App) {
    let Some(selected) = app.day_picker else {
        return;
    };
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 36, 56);

    let block = Block::default()
        .title("Add to planner")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Cyan).bg(Color::Black));

    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    app.picker_rects.clear();
    for (i, day) in DayKey::ALL.iter().enumerate() {
        let y = inner.y + i as u16;
        if y >= inner.y + inner.height {
            break;
        }
        let row = Rect {
            x: inner.x,
            y,
            width: inner.width,
            height: 1,
        };
        let style = if i == selected {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let line = Paragraph::new(day.label()).style(style);
        app.picker_rects.push((i, row));
        frame.render_widget(line, row);
    }

    if inner.height > DayKey::ALL.len() as u16 {
        let hint_area = Rect {
            x: inner.x,
            y: inner.y + inner.height - 1,
            width: inner.width,
            height: 1,
        };
        let hint = Paragraph::new("Enter choose - Esc cancel")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray).italic());
        frame.render_widget(hint, hint_area);
    }
}

fn draw_day_summary_popup(frame: &mut ratatui::Frame, app: &mut App) {
    let Some(day) = app.day_summary else {
        return;
    };
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 60, 60);

    let block = Block::default()
        .title(format!("{} summary", day.label()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Cyan).bg(Color::Black));

    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(2),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(inner);

    app.summary_rects.clear();
    let ids = app.state.planner.day(day).clone();
    if ids.is_empty() {
        let para = Paragraph::new("No meals planned.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(para, chunks[0]);
    } else {
        for (i, id) in ids.iter().enumerate() {
            let y = chunks[0].y + i as u16;
            if y >= chunks[0].y + chunks[0].height {
                break;
            }
            let row = Rect {
                x: chunks[0].x,
                y,
                width: chunks[0].width,
                height: 1,
            };
            let (name, kcal) = match app.state.recipe(id) {
                Some(recipe) => (
                    recipe.name.clone(),
                    match recipe.calories {
                        Some(c) => format!("{c:.0} kcal"),
                        None => "?".to_string(),
                    },
                ),
                None => (format!("Recipe {id}"), "?".to_string()),
            };
            let style = if i == app.day_summary_selected {
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let line = Paragraph::new(format!("{name}  -  {kcal}")).style(style);
            app.summary_rects.push((i, row));
            frame.render_widget(line, row);
        }
    }

    let total = app.state.planned_calories(day);
    let total_text = if total > 0.0 {
        format!("Total calories: {total:.0} kcal")
    } else {
        "Total calories: ?".to_string()
    };
    let totals = Paragraph::new(vec![
        Line::from(Span::styled(
            total_text,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Calories are approximate and only shown where data is available.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(totals, chunks[1]);

    let hint = Paragraph::new("x remove meal - Esc close")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray).italic());
    frame.render_widget(hint, chunks[2]);
}

fn draw_photo_prompt(frame: &mut ratatui::Frame, app: &App) {
    let Some(prompt) = &app.photo_prompt else {
        return;
    };
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 64, 24);

    frame.render_widget(Clear, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let input = Paragraph::new(format!("{prompt}_"))
        .block(
            Block::default()
                .title("Add photo - path to an image file")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    frame.render_widget(input, layout[0]);

    let hint = Paragraph::new("Enter add - Esc cancel. png, jpg, gif, webp or bmp up to 5 MB.")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray).italic());
    frame.render_widget(hint, layout[1]);
}

fn draw_help_overlay(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let width = size.width.saturating_mul(3) / 4;
    let height = size.height.saturating_mul(3) / 4;
    let x = size.x + (size.width.saturating_sub(width)) / 2;
    let y = size.y + (size.height.saturating_sub(height)) / 2;
    let area = Rect {
        x,
        y,
        width,
        height,
    };

    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = Vec::new();
    for topic in HELP_TOPICS {
        lines.push(Line::from(Span::styled(
            topic.title,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(topic.detail));
        lines.push(Line::from(""));
    }

    let help_block = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Help (Esc to close, wheel to scroll)")
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.help_scroll, 0))
        .style(Style::default().fg(Color::White).bg(Color::Black));
    frame.render_widget(help_block, area);
}

fn draw_login(frame: &mut ratatui::Frame, form: &LoginForm, config: &Config) {
    let size = frame.size();
    let area = get_popup_area(size.width, size.height, 56, 52);

    let block = Block::default()
        .title("MealMap - Sign in")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(inner);

    let email_style = if form.focus_password {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    };
    let email_text = if form.focus_password {
        form.email.clone()
    } else {
        format!("{}_", form.email)
    };
    let email = Paragraph::new(email_text)
        .block(Block::default().title("Email").borders(Borders::ALL))
        .style(email_style);
    frame.render_widget(email, chunks[0]);

    let password_style = if form.focus_password {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };
    let mut masked = "*".repeat(form.password.chars().count());
    if form.focus_password {
        masked.push('_');
    }
    let password = Paragraph::new(masked)
        .block(Block::default().title("Password").borders(Borders::ALL))
        .style(password_style);
    frame.render_widget(password, chunks[1]);

    if let Some(error) = &form.error {
        let err = Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(err, chunks[2]);
    }

    let demo = Paragraph::new(format!("Demo account: {}", config.login_email))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(demo, chunks[3]);

    let hint = Paragraph::new("Enter sign in - Tab switch field - Esc quit")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray).italic());
    frame.render_widget(hint, chunks[4]);
}

// ============================================================================
// HELPERS
// ============================================================================

/// Get centered popup area for overlays
fn get_popup_area(
    frame_width: u16,
    frame_height: u16,
    width_percent: u16,
    height_percent: u16,
) -> Rect {
    let width = frame_width.saturating_mul(width_percent) / 100;
    let height = frame_height.saturating_mul(height_percent) / 100;
    let x = (frame_width.saturating_sub(width)) / 2;
    let y = (frame_height.saturating_sub(height)) / 2;
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn inside_rect(mouse: MouseEvent, rect: Rect) -> bool {
    mouse.row >= rect.y
        && mouse.row < rect.y + rect.height
        && mouse.column >= rect.x
        && mouse.column < rect.x + rect.width
}

// Helper: Find clicked item index from mouse event
fn find_clicked_item(mouse: MouseEvent, items: &[(usize, Rect)]) -> Option<usize> {
    items
        .iter()
        .find(|(_, rect)| inside_rect(mouse, *rect))
        .map(|(idx, _)| *idx)
}

// Helper: Split a rectangular area into N equal horizontal chunks
fn split_equal_horizontal(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let pct = 100 / count as u16;
    let mut constraints = Vec::with_capacity(count);
    for _ in 0..count {
        constraints.push(Constraint::Percentage(pct));
    }
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

/// Moves a list selection by delta, clamped to the collection.
fn list_nav(list: &mut ListState, len: usize, delta: i64) {
    if len == 0 {
        list.select(None);
        return;
    }
    let current = list.selected().unwrap_or(0) as i64;
    let next = (current + delta).clamp(0, len as i64 - 1) as usize;
    list.select(Some(next));
}

fn clamp_list(list: &mut ListState, len: usize) {
    match list.selected() {
        Some(_) if len == 0 => list.select(None),
        Some(i) if i >= len => list.select(Some(len - 1)),
        None if len > 0 => list.select(Some(0)),
        _ => {}
    }
}

/// Registers one clickable rect per visible list row, matching what
/// render_stateful_widget just put on screen.
fn register_row_rects(rects: &mut Vec<(usize, Rect)>, list: &ListState, len: usize, area: Rect) {
    rects.clear();
    let inner_height = area.height.saturating_sub(2) as usize;
    for (row, idx) in (list.offset()..len).take(inner_height).enumerate() {
        rects.push((
            idx,
            Rect {
                x: area.x + 1,
                y: area.y + 1 + row as u16,
                width: area.width.saturating_sub(2),
                height: 1,
            },
        ));
    }
}

fn recipe_row(recipe: &Recipe, saved: bool) -> Line<'static> {
    let mut spans = vec![Span::styled(
        recipe.name.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    let mut meta = format!("  {} mins - {}", recipe.time, recipe.difficulty);
    if !recipe.tags.is_empty() {
        meta.push_str(" - ");
        meta.push_str(&recipe.tags.join(", "));
    }
    spans.push(Span::styled(meta, Style::default().fg(Color::DarkGray)));
    if saved {
        spans.push(Span::styled(
            "  [saved]",
            Style::default().fg(Color::Magenta),
        ));
    }
    Line::from(spans)
}

fn photo_row(photo: &MealPhoto) -> Line<'static> {
    let taken = Local
        .timestamp_millis_opt(photo.timestamp)
        .single()
        .map(|dt| dt.format("%d %b %Y %H:%M").to_string())
        .unwrap_or_else(|| photo.id.clone());
    let size_kb = photo.data_url.len() * 3 / 4 / 1024;
    Line::from(vec![
        Span::styled(
            format!("Meal photo  {taken}"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  ~{size_kb} KB"),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

/// Does this recipe pass the browse query and tag filter? The query
/// matches against name, difficulty and tag text.
fn recipe_matches(recipe: &Recipe, query: &str, filter: FilterOption) -> bool {
    let query = query.trim().to_lowercase();
    if !query.is_empty() {
        let name = recipe.name.to_lowercase();
        let difficulty = recipe.difficulty.to_lowercase();
        let tags = recipe.tags.join(" ").to_lowercase();
        if !name.contains(&query) && !difficulty.contains(&query) && !tags.contains(&query) {
            return false;
        }
    }
    match filter.tag() {
        None => true,
        Some(tag) => recipe.tags.iter().any(|t| t.to_lowercase() == tag),
    }
}

// ===== Photo encoding =====

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

fn extension_for_mime(mime: &str) -> &'static str {
    IMAGE_TYPES
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
        .unwrap_or("png")
}

/// Reads an image file into an embedded data URL, enforcing the size cap.
/// Errors are user-facing status messages.
fn photo_data_url_from_file(path: &Path) -> Result<String, String> {
    let Some(mime) = mime_for_extension(path) else {
        return Err("Unsupported image type. Use png, jpg, gif, webp or bmp.".to_string());
    };
    let meta = fs::metadata(path).map_err(|err| format!("Cannot read image: {err}"))?;
    if meta.len() > MAX_PHOTO_BYTES {
        return Err("Image is larger than 5 MB.".to_string());
    }
    let bytes = fs::read(path).map_err(|err| format!("Cannot read image: {err}"))?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

fn parse_data_url(data_url: &str) -> Option<(&str, &str)> {
    let rest = data_url.strip_prefix("data:")?;
    rest.split_once(";base64,")
}

/// Decodes a gallery photo into a temp file so the system image viewer
/// can show it.
fn export_photo(photo: &MealPhoto) -> Result<PathBuf, String> {
    let (mime, payload) =
        parse_data_url(&photo.data_url).ok_or("Photo data is not an embedded image.")?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| format!("Photo data is corrupt: {err}"))?;
    let path = std::env::temp_dir().join(format!(
        "mealmap-photo-{}.{}",
        photo.id,
        extension_for_mime(mime)
    ));
    fs::write(&path, bytes).map_err(|err| format!("Cannot write photo: {err}"))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tagged_recipe(name: &str, difficulty: &str, tags: &[&str]) -> Recipe {
        Recipe {
            id: name.to_lowercase(),
            name: name.to_string(),
            difficulty: difficulty.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Recipe::default()
        }
    }

    #[test]
    fn query_matches_name_difficulty_and_tags() {
        let recipe = tagged_recipe("Chickpea Curry", "Easy", &["Vegetarian", "Budget"]);

        assert!(recipe_matches(&recipe, "curry", FilterOption::All));
        assert!(recipe_matches(&recipe, "EASY", FilterOption::All));
        assert!(recipe_matches(&recipe, "budget", FilterOption::All));
        assert!(!recipe_matches(&recipe, "noodles", FilterOption::All));
        assert!(recipe_matches(&recipe, "", FilterOption::All));
    }

    #[test]
    fn filter_requires_tag_membership() {
        let veggie = tagged_recipe("Soup", "Easy", &["Vegetarian"]);
        let plain = tagged_recipe("Fajitas", "Medium", &[]);

        assert!(recipe_matches(&veggie, "", FilterOption::Vegetarian));
        assert!(!recipe_matches(&plain, "", FilterOption::Vegetarian));
        assert!(!recipe_matches(&veggie, "", FilterOption::Vegan));
    }

    #[test]
    fn query_and_filter_combine() {
        let recipe = tagged_recipe("Egg Fried Rice", "Easy", &["Quick", "Budget"]);

        assert!(recipe_matches(&recipe, "rice", FilterOption::Quick));
        assert!(!recipe_matches(&recipe, "rice", FilterOption::Vegan));
        assert!(!recipe_matches(&recipe, "soup", FilterOption::Quick));
    }

    #[test]
    fn filter_cycle_wraps_around() {
        let mut option = FilterOption::All;
        for _ in 0..5 {
            option = option.next();
        }
        assert_eq!(option, FilterOption::All);
    }

    #[test]
    fn photo_file_round_trips_through_data_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meal.png");
        fs::write(&path, b"fake png bytes").unwrap();

        let data_url = photo_data_url_from_file(&path).unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));

        let (mime, payload) = parse_data_url(&data_url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(STANDARD.decode(payload).unwrap(), b"fake png bytes");
    }

    #[test]
    fn unsupported_image_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"not an image").unwrap();

        let err = photo_data_url_from_file(&path).unwrap_err();
        assert!(err.contains("Unsupported image type"));
    }

    #[test]
    fn export_writes_decoded_photo_to_temp() {
        let photo = MealPhoto {
            id: "123456".to_string(),
            data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(b"jpeg data")),
            timestamp: 0,
        };

        let path = export_photo(&photo).unwrap();
        assert!(path.to_string_lossy().ends_with(".jpg"));
        assert_eq!(fs::read(&path).unwrap(), b"jpeg data");
        fs::remove_file(path).ok();
    }

    #[test]
    fn export_rejects_plain_strings() {
        let photo = MealPhoto {
            id: "1".to_string(),
            data_url: "not a data url".to_string(),
            timestamp: 0,
        };
        assert!(export_photo(&photo).is_err());
    }

    #[test]
    fn mime_lookup_is_case_insensitive_on_extension() {
        assert_eq!(mime_for_extension(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_for_extension(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_extension(Path::new("a")), None);
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
    }
}
