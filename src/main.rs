//! Yolk Drift entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent, TouchEvent};

    use yolk_drift::consts::*;
    use yolk_drift::profile::{Profile, RunOutcome, TrophyKind, UltimateKind, format_date};
    use yolk_drift::settings::Settings;
    use yolk_drift::sim::{
        AbilityHud, GamePhase, GameState, SimEvent, TickInput, WorldView, apply_view, reset_run,
        tick,
    };

    /// Virtual stick travel in CSS pixels before the axis saturates
    const STICK_RADIUS: f32 = 56.0;

    /// Game instance holding all state
    struct Game {
        state: GameState,
        profile: Profile,
        settings: Settings,
        input: TickInput,
        /// Mouse position captured since the last tick (canvas coordinates)
        pending_mouse: Option<Vec2>,
        /// Active touch per virtual stick: (touch id, anchor point)
        move_touch: Option<(i32, Vec2)>,
        aim_touch: Option<(i32, Vec2)>,
        last_time: f64,
        fine_pointer: bool,
        touch_device: bool,
        start_level: u32,
        /// Wall deadline for the center toast
        toast_until: f64,
    }

    impl Game {
        fn new(
            seed: u64,
            view: WorldView,
            profile: Profile,
            settings: Settings,
            fine_pointer: bool,
            touch_device: bool,
        ) -> Self {
            Self {
                state: GameState::new(seed, view),
                profile,
                settings,
                input: TickInput::default(),
                pending_mouse: None,
                move_touch: None,
                aim_touch: None,
                last_time: 0.0,
                fine_pointer,
                touch_device,
                start_level: 1,
                toast_until: 0.0,
            }
        }

        /// Fold the persisted profile into the state and launch a run
        fn start_run(&mut self) {
            self.profile.apply_to(&mut self.state);
            reset_run(&mut self.state, self.start_level);
            self.input = TickInput::default();
            log::info!(
                "Run started at level {} with {} CC banked",
                self.start_level,
                self.profile.cash
            );
        }

        /// Run one simulation step and process what it produced
        fn update(&mut self, dt_ms: f32, time: f64) {
            self.input.mouse_canvas = self.pending_mouse.take();
            self.input.mouse_aim_enabled = self.settings.mouse_aim_enabled(self.fine_pointer);

            let input = self.input;
            tick(&mut self.state, &input, dt_ms);

            // Clear one-shot inputs after processing
            self.input.dock = false;
            self.input.pause = false;
            self.input.laser = false;
            self.input.nuke = false;

            self.handle_events(time);
        }

        /// Drain sim events into toasts and persistence
        fn handle_events(&mut self, time: f64) {
            let events: Vec<SimEvent> = self.state.events.drain(..).collect();
            for event in events {
                match event {
                    SimEvent::DockConnecting => {
                        self.toast("CONNECTING…", DOCK_CONNECT_MS as f64, time)
                    }
                    SimEvent::DockUnavailable => {
                        self.toast("NO CRYSTAL LINK AVAILABLE", 650.0, time)
                    }
                    SimEvent::DockAborted => self.toast("CONNECTION ABORTED", 550.0, time),
                    SimEvent::DockFieldOnline => {
                        self.toast("FIELD ONLINE — STAY INSIDE", 900.0, time)
                    }
                    SimEvent::DockConnectionLost => self.toast("CONNECTION LOST", 700.0, time),
                    SimEvent::EnergyFull => self.toast("ENERGY FULL", 850.0, time),
                    SimEvent::RiftOpened => self.toast("A RIFT HAS OPENED", 1400.0, time),
                    SimEvent::RiftClosed => self.toast("THE RIFT CLOSED", 800.0, time),
                    SimEvent::BonusEntered => self.toast("BONUS ROOM!", 900.0, time),
                    SimEvent::BonusEnded => self.toast("RETURNED", 700.0, time),
                    SimEvent::LevelUp { level } => {
                        self.toast(&format!("LEVEL {}", level), 850.0, time)
                    }
                    SimEvent::PowerUpCollected { kind } => self.toast(kind.label(), 520.0, time),
                    SimEvent::CheckpointUnlocked { level } => {
                        if self.profile.unlock_checkpoint(level).is_some() {
                            self.profile.save();
                            log::info!("Checkpoint unlocked: level {}", level);
                        }
                    }
                    SimEvent::CashChanged { total } => {
                        self.profile.cash = total;
                        self.profile.save();
                    }
                    SimEvent::RunEnded {
                        time_seconds,
                        level,
                        cash_earned,
                    } => {
                        let outcome = self.profile.record_run(
                            time_seconds,
                            level,
                            cash_earned,
                            js_sys::Date::now(),
                        );
                        // Milestone bonuses land in the wallet; mirror them back
                        self.state.cash = self.profile.cash;
                        self.profile.save();
                        show_game_over(time_seconds, level, cash_earned, &outcome);
                    }
                    SimEvent::ShotFired
                    | SimEvent::ShotBlocked
                    | SimEvent::EnemyKilled { .. }
                    | SimEvent::PlayerHit => {
                        // Sound hooks; audio is owned by the embedding page
                    }
                }
            }
        }

        fn toast(&mut self, text: &str, duration_ms: f64, time: f64) {
            self.toast_until = time + duration_ms;
            if let Some(el) = element("center-toast") {
                el.set_text_content(Some(text));
                let _ = el.class_list().remove_1("hidden");
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self, time: f64) {
            let hud = self.state.hud();

            set_text("hud-level", &hud.level.to_string());
            set_text("hud-time", &format_run_time(hud.elapsed_seconds));
            set_text("hud-lives", &hud.lives.to_string());
            set_text("hud-cash", &format!("{} CC", hud.cash));

            if let Some(el) = element("hud-energy-bar") {
                let _ = el.set_attribute(
                    "style",
                    &format!("width:{:.1}%", hud.energy_fraction * 100.0),
                );
            }

            if let Some(el) = element("hud-target") {
                match hud.target_color {
                    Some(color) => {
                        el.set_text_content(Some(color.name()));
                        let _ = el.set_attribute("style", &format!("color:#{:06X}", color.rgb()));
                    }
                    None => el.set_text_content(Some("CLEAR")),
                }
            }

            let pills: Vec<String> = hud
                .powerups
                .iter()
                .map(|(kind, secs)| format!("{} {:.0}s", kind.label(), secs.ceil()))
                .collect();
            set_text("hud-powerups", &pills.join("  "));

            if hud.in_bonus {
                set_text("hud-bonus", &format!("BONUS {:.0}s", hud.bonus_seconds_left.ceil()));
            }
            set_hidden("hud-bonus", !hud.in_bonus);

            set_text("hud-laser", &ability_label(&hud.laser));
            set_text("hud-nuke", &ability_label(&hud.nuke));

            // Phase-driven panels
            let phase = self.state.phase;
            set_hidden("main-menu", phase != GamePhase::Menu);
            set_hidden("pause-menu", phase != GamePhase::Paused);
            set_hidden("game-over", phase != GamePhase::GameOver);
            set_hidden("hud", phase == GamePhase::Menu);

            if time >= self.toast_until {
                set_hidden("center-toast", true);
            }
        }
    }

    fn ability_label(ability: &AbilityHud) -> String {
        if !ability.owned {
            "LOCKED".to_string()
        } else if ability.active {
            "ACTIVE".to_string()
        } else if ability.ready {
            "READY".to_string()
        } else {
            format!("{:.0}s", ability.cooldown_seconds.ceil())
        }
    }

    /// Minutes:seconds readout for run time
    fn format_run_time(seconds: f32) -> String {
        let total = seconds.max(0.0) as u32;
        format!("{}:{:02}", total / 60, total % 60)
    }

    fn element(id: &str) -> Option<web_sys::Element> {
        web_sys::window()?.document()?.get_element_by_id(id)
    }

    fn set_text(id: &str, text: &str) {
        if let Some(el) = element(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_hidden(id: &str, hidden: bool) {
        if let Some(el) = element(id) {
            let classes = el.class_list();
            let _ = if hidden {
                classes.add_1("hidden")
            } else {
                classes.remove_1("hidden")
            };
        }
    }

    /// Fill the end-of-run panel with the summary and any milestone payouts
    fn show_game_over(time_seconds: f32, level: u32, cash_earned: u64, outcome: &RunOutcome) {
        set_text("final-time", &format_run_time(time_seconds));
        set_text("final-level", &level.to_string());
        set_text("final-cash", &format!("{} CC", cash_earned));
        set_text(
            "final-rank",
            &match outcome.rank {
                Some(rank) => format!("#{}", rank),
                None => "-".to_string(),
            },
        );
        if outcome.unlocked.is_empty() {
            set_text("final-milestones", "");
        } else {
            set_text(
                "final-milestones",
                &format!(
                    "{} (+{} CC)",
                    outcome.unlocked.join(", "),
                    outcome.bonus_cash
                ),
            );
        }
    }

    /// Sync the menu and shop labels with the profile
    fn refresh_menu(game: &Game) {
        set_text("menu-cash", &format!("{} CC", game.profile.cash));
        set_text("level-label", &format!("LEVEL {}", game.start_level));
        match game.profile.top_run() {
            Some(best) => set_text(
                "menu-best",
                &format!(
                    "BEST: LEVEL {} at {} ({})",
                    best.level,
                    format_run_time(best.time_seconds),
                    format_date(best.ended_at)
                ),
            ),
            None => set_text("menu-best", "NO RUNS YET"),
        }

        let mouse = game.settings.mouse_aim_enabled(game.fine_pointer);
        set_text("aim-mode-btn", if mouse { "MOUSE" } else { "Z/X" });
        set_text("music-btn", if game.settings.music { "MUSIC ON" } else { "MUSIC OFF" });
        set_text("sfx-btn", if game.settings.sfx { "SFX ON" } else { "SFX OFF" });

        for kind in TrophyKind::ALL {
            let level = game.profile.trophies.get(kind);
            let label = match game.profile.trophy_next_price(kind) {
                Some(price) if level == 0 => format!("{} ({} CC)", kind.name(), price),
                Some(price) => format!("{} LV{} ({} CC)", kind.name(), level + 1, price),
                None => format!("{} MAXED", kind.name()),
            };
            if let Some(el) = element(trophy_button_id(kind)) {
                el.set_text_content(Some(&label));
                let _ = el.set_attribute("title", kind.blurb());
            }
        }

        for kind in UltimateKind::ALL {
            let slot = game.profile.ultimate(kind);
            let name = match kind {
                UltimateKind::Laser => "LASER",
                UltimateKind::Nuke => "NUKE",
            };
            let label = if !slot.owned {
                format!("BUY {} ({} CC)", name, kind.base_price())
            } else if !slot.mk2 {
                format!("UPGRADE {} ({} CC)", name, kind.upgrade_price())
            } else {
                format!("{} MK2", name)
            };
            set_text(ultimate_button_id(kind), &label);
        }
    }

    fn trophy_button_id(kind: TrophyKind) -> &'static str {
        match kind {
            TrophyKind::Spark => "buy-spark-btn",
            TrophyKind::Prism => "buy-prism-btn",
            TrophyKind::Frost => "buy-frost-btn",
            TrophyKind::Nova => "buy-nova-btn",
        }
    }

    fn ultimate_button_id(kind: UltimateKind) -> &'static str {
        match kind {
            UltimateKind::Laser => "buy-laser-btn",
            UltimateKind::Nuke => "buy-nuke-btn",
        }
    }

    fn media_matches(window: &web_sys::Window, query: &str) -> bool {
        window
            .match_media(query)
            .ok()
            .flatten()
            .map(|m| m.matches())
            .unwrap_or(false)
    }

    /// Size the canvas backing store to the device pixel grid
    fn size_canvas(canvas: &HtmlCanvasElement) {
        if let Some(window) = web_sys::window() {
            let dpr = window.device_pixel_ratio();
            canvas.set_width((canvas.client_width() as f64 * dpr) as u32);
            canvas.set_height((canvas.client_height() as f64 * dpr) as u32);
        }
    }

    fn canvas_view(canvas: &HtmlCanvasElement, touch: bool) -> WorldView {
        WorldView::new(
            canvas.client_width() as f32,
            canvas.client_height() as f32,
            touch,
            false,
        )
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Yolk Drift starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.class_list().add_1("hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");
        size_canvas(&canvas);

        let fine_pointer =
            media_matches(&window, "(pointer: fine)") && media_matches(&window, "(hover: hover)");
        let touch_device =
            js_sys::Reflect::has(window.as_ref(), &JsValue::from_str("ontouchstart"))
                .unwrap_or(false);

        let settings = Settings::load();
        let profile = Profile::load();
        let seed = js_sys::Date::now() as u64;
        let view = canvas_view(&canvas, touch_device);

        let game = Rc::new(RefCell::new(Game::new(
            seed,
            view,
            profile,
            settings,
            fine_pointer,
            touch_device,
        )));
        log::info!(
            "Game initialized with seed {} ({}x{}, touch={})",
            seed,
            view.w,
            view.h,
            touch_device
        );

        refresh_menu(&game.borrow());

        setup_input_handlers(&canvas, game.clone());
        setup_menu_buttons(game.clone());
        setup_resize(&canvas, game.clone());
        setup_auto_pause(game.clone());

        request_animation_frame(game);

        log::info!("Yolk Drift running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Keyboard held state + edge-triggered hotkeys
        {
            let game = game.clone();
            let window = web_sys::window().unwrap();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "ArrowUp" | "w" | "W" => g.input.up = true,
                    "ArrowDown" | "s" | "S" => g.input.down = true,
                    "ArrowLeft" | "a" | "A" => g.input.left = true,
                    "ArrowRight" | "d" | "D" => g.input.right = true,
                    "z" | "Z" => g.input.aim_left = true,
                    "x" | "X" => g.input.aim_right = true,
                    "e" | "E" => {
                        if !event.repeat() {
                            g.input.dock = true;
                        }
                    }
                    "p" | "P" | "Escape" => {
                        if !event.repeat() {
                            g.input.pause = true;
                        }
                    }
                    " " => {
                        if !event.repeat() {
                            g.input.laser = true;
                        }
                    }
                    "Shift" => {
                        if !event.repeat() {
                            g.input.nuke = true;
                        }
                    }
                    _ => return,
                }
                event.prevent_default();
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let window = web_sys::window().unwrap();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "ArrowUp" | "w" | "W" => g.input.up = false,
                    "ArrowDown" | "s" | "S" => g.input.down = false,
                    "ArrowLeft" | "a" | "A" => g.input.left = false,
                    "ArrowRight" | "d" | "D" => g.input.right = false,
                    "z" | "Z" => g.input.aim_left = false,
                    "x" | "X" => g.input.aim_right = false,
                    _ => return,
                }
                event.prevent_default();
            });
            let _ =
                window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse aim: positions are canvas-relative CSS pixels
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut g = game.borrow_mut();
                g.pending_mouse = Some(Vec2::new(
                    event.offset_x() as f32,
                    event.offset_y() as f32,
                ));
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch: left half drives the move stick, right half the aim stick
        {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let rect = canvas_clone.get_bounding_client_rect();
                let mut g = game.borrow_mut();
                let touches = event.changed_touches();
                for i in 0..touches.length() {
                    let Some(touch) = touches.get(i) else { continue };
                    let pos = Vec2::new(
                        touch.client_x() as f32 - rect.left() as f32,
                        touch.client_y() as f32 - rect.top() as f32,
                    );
                    let id = touch.identifier();
                    if pos.x < rect.width() as f32 / 2.0 {
                        if g.move_touch.is_none() {
                            g.move_touch = Some((id, pos));
                            g.input.move_stick_active = true;
                        }
                    } else if g.aim_touch.is_none() {
                        g.aim_touch = Some((id, pos));
                        g.input.aim_stick_active = true;
                    }
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let rect = canvas_clone.get_bounding_client_rect();
                let mut g = game.borrow_mut();
                let touches = event.changed_touches();
                for i in 0..touches.length() {
                    let Some(touch) = touches.get(i) else { continue };
                    let pos = Vec2::new(
                        touch.client_x() as f32 - rect.left() as f32,
                        touch.client_y() as f32 - rect.top() as f32,
                    );
                    let id = touch.identifier();
                    if let Some((move_id, anchor)) = g.move_touch {
                        if move_id == id {
                            let axis = stick_axis(pos, anchor);
                            g.input.move_x = axis.x;
                            g.input.move_y = axis.y;
                        }
                    }
                    if let Some((aim_id, anchor)) = g.aim_touch {
                        if aim_id == id {
                            let axis = stick_axis(pos, anchor);
                            g.input.aim_x = axis.x;
                            g.input.aim_y = axis.y;
                        }
                    }
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("touchmove", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        for event_name in ["touchend", "touchcancel"] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let mut g = game.borrow_mut();
                let touches = event.changed_touches();
                for i in 0..touches.length() {
                    let Some(touch) = touches.get(i) else { continue };
                    let id = touch.identifier();
                    if g.move_touch.is_some_and(|(move_id, _)| move_id == id) {
                        g.move_touch = None;
                        g.input.move_stick_active = false;
                        g.input.move_x = 0.0;
                        g.input.move_y = 0.0;
                    }
                    if g.aim_touch.is_some_and(|(aim_id, _)| aim_id == id) {
                        g.aim_touch = None;
                        g.input.aim_stick_active = false;
                        g.input.aim_x = 0.0;
                        g.input.aim_y = 0.0;
                    }
                }
            });
            let _ = canvas
                .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// Stick displacement normalized to [-1, 1] per axis
    fn stick_axis(pos: Vec2, anchor: Vec2) -> Vec2 {
        let delta = (pos - anchor) / STICK_RADIUS;
        if delta.length() > 1.0 {
            delta.normalize()
        } else {
            delta
        }
    }

    fn setup_menu_buttons(game: Rc<RefCell<Game>>) {
        on_click("start-btn", game.clone(), |g| {
            g.start_run();
        });
        on_click("restart-btn", game.clone(), |g| {
            g.start_run();
        });
        on_click("resume-btn", game.clone(), |g| {
            g.input.pause = true;
        });
        on_click("menu-btn", game.clone(), |g| {
            g.state.phase = GamePhase::Menu;
            refresh_menu(g);
        });
        on_click("aim-mode-btn", game.clone(), |g| {
            let fine = g.fine_pointer;
            let enabled = g.settings.toggle_mouse_aim(fine);
            g.settings.save();
            log::info!("Mouse aim: {}", enabled);
            refresh_menu(g);
        });
        // Audio playback lives in the embedding page; it watches these flags
        on_click("music-btn", game.clone(), |g| {
            g.settings.music = !g.settings.music;
            g.settings.save();
            refresh_menu(g);
        });
        on_click("sfx-btn", game.clone(), |g| {
            g.settings.sfx = !g.settings.sfx;
            g.settings.save();
            refresh_menu(g);
        });
        on_click("level-prev-btn", game.clone(), |g| {
            cycle_start_level(g, -1);
            refresh_menu(g);
        });
        on_click("level-next-btn", game.clone(), |g| {
            cycle_start_level(g, 1);
            refresh_menu(g);
        });

        for kind in TrophyKind::ALL {
            on_click(trophy_button_id(kind), game.clone(), move |g| {
                if g.profile.buy_trophy(kind) {
                    g.profile.save();
                    g.state.cash = g.profile.cash;
                    log::info!("Bought {} (level {})", kind.name(), g.profile.trophies.get(kind));
                }
                refresh_menu(g);
            });
        }
        for kind in UltimateKind::ALL {
            on_click(ultimate_button_id(kind), game.clone(), move |g| {
                if g.profile.buy_ultimate(kind) {
                    g.profile.save();
                    g.state.cash = g.profile.cash;
                }
                refresh_menu(g);
            });
        }
    }

    fn on_click<F>(id: &str, game: Rc<RefCell<Game>>, handler: F)
    where
        F: Fn(&mut Game) + 'static,
    {
        let Some(el) = element(id) else { return };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
            handler(&mut game.borrow_mut());
        });
        let _ = el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn cycle_start_level(game: &mut Game, step: i32) {
        let levels = game.profile.start_levels();
        let index = levels
            .iter()
            .position(|&l| l == game.start_level)
            .unwrap_or(0);
        let next = (index as i32 + step).rem_euclid(levels.len() as i32) as usize;
        game.start_level = levels[next];
    }

    fn setup_resize(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let canvas = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            size_canvas(&canvas);
            let mut g = game.borrow_mut();
            let touch = g.touch_device;
            apply_view(&mut g.state, canvas_view(&canvas, touch));
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_auto_pause(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        // Visibility change (tab switch, minimize)
        {
            let game = game.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    let mut g = game.borrow_mut();
                    if g.settings.pause_on_blur && g.state.phase == GamePhase::Playing {
                        g.input.pause = true;
                        log::info!("Auto-paused (tab hidden)");
                    }
                }
            });
            let _ = document.add_event_listener_with_callback(
                "visibilitychange",
                closure.as_ref().unchecked_ref(),
            );
            closure.forget();
        }

        // Window blur (click outside)
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                let mut g = game.borrow_mut();
                if g.settings.pause_on_blur && g.state.phase == GamePhase::Playing {
                    g.input.pause = true;
                    log::info!("Auto-paused (window blur)");
                }
            });
            let _ =
                window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let dt_ms = if g.last_time > 0.0 {
                (time - g.last_time) as f32
            } else {
                BASE_FRAME_MS
            };
            g.last_time = time;

            g.update(dt_ms, time);
            g.update_hud(time);

            // Re-anchor outside active play so resuming never makes a
            // catch-up jump
            if g.state.phase != GamePhase::Playing {
                g.last_time = time;
            }
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::time::{SystemTime, UNIX_EPOCH};

    use yolk_drift::consts::BASE_FRAME_MS;
    use yolk_drift::sim::{GamePhase, GameState, TickInput, WorldView, reset_run, tick};

    env_logger::init();
    log::info!("Yolk Drift (native) starting...");

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0x5EED);
    let mut state = GameState::new(seed, WorldView::default());
    reset_run(&mut state, 1);
    log::info!("Headless demo run with seed {}", seed);

    // Scripted wander so the full loop gets exercised without a browser:
    // cycle through the four directions and keep nudging the aim
    let mut input = TickInput::default();
    for frame in 0..3600u32 {
        let leg = (frame / 120) % 4;
        input.up = leg == 0;
        input.right = leg == 1;
        input.down = leg == 2;
        input.left = leg == 3;
        input.aim_right = frame % 3 == 0;

        tick(&mut state, &input, BASE_FRAME_MS);
        state.events.clear();

        if frame % 600 == 599 {
            let hud = state.hud();
            log::info!(
                "t={:>3.0}s level={} lives={} energy={:>3.0}% cash={} enemies={}",
                hud.elapsed_seconds,
                hud.level,
                hud.lives,
                hud.energy_fraction * 100.0,
                hud.cash,
                state.enemies.len(),
            );
        }
        if state.phase == GamePhase::GameOver {
            break;
        }
    }

    let hud = state.hud();
    println!(
        "Demo over: level {}, {} survived, {} CC banked",
        hud.level,
        format_demo_time(hud.elapsed_seconds),
        hud.cash
    );
}

#[cfg(not(target_arch = "wasm32"))]
fn format_demo_time(seconds: f32) -> String {
    let total = seconds.max(0.0) as u32;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
