//! Brickfall entry point
//!
//! On the web: browser frame loop, pointer/keyboard input, DOM HUD and the
//! remote leaderboard. Natively: a headless autoplay demo of a daily
//! session against in-memory storage and an in-memory leaderboard.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, PointerEvent};

    use brickfall::audio::{FeedbackSink, WebFeedback, dispatch};
    use brickfall::consts::*;
    use brickfall::leaderboard::{LeaderboardClient, MAX_LIMIT};
    use brickfall::persistence::Repository;
    use brickfall::platform::{LocalStorageStore, now_ms, wall_clock_ms};
    use brickfall::session::SessionNotice;
    use brickfall::sim::{GamePhase, StepInput};
    use brickfall::{DayKey, GameMode, GameSession, Settings, Tuning};

    /// Game instance holding all state
    struct Game {
        session: GameSession,
        settings: Settings,
        feedback: WebFeedback,
        client: Option<LeaderboardClient>,
        input: StepInput,
        last_time: f64,
        /// CSS pixels -> playfield units
        scale: f32,
        toast_until: f64,
    }

    impl Game {
        fn update(&mut self, time: f64) {
            let dt = if self.last_time > 0.0 {
                ((time - self.last_time) / 1000.0) as f32
            } else {
                MAX_DT
            };
            self.last_time = time;

            let events = self.session.frame(&self.input, dt, now_ms());
            dispatch(&mut self.feedback, &events);

            // One-shot inputs
            self.input.launch = false;
            self.input.pause = false;
        }

        fn draw(&self, ctx: &CanvasRenderingContext2d) {
            let state = self.session.state();
            let s = self.scale as f64;

            ctx.set_fill_style_str("#0b0d17");
            ctx.fill_rect(0.0, 0.0, FIELD_WIDTH as f64 * s, FIELD_HEIGHT as f64 * s);

            for brick in state.bricks.iter().filter(|b| b.alive) {
                ctx.set_fill_style_str(if brick.hp > 1 { "#c0c6d8" } else { "#ff7a59" });
                ctx.fill_rect(
                    brick.pos.x as f64 * s,
                    brick.pos.y as f64 * s,
                    brick.size.x as f64 * s,
                    brick.size.y as f64 * s,
                );
            }

            let paddle = state.paddle.rect();
            ctx.set_fill_style_str("#59d0ff");
            ctx.fill_rect(
                paddle.min.x as f64 * s,
                paddle.min.y as f64 * s,
                (paddle.max.x - paddle.min.x) as f64 * s,
                (paddle.max.y - paddle.min.y) as f64 * s,
            );

            ctx.set_fill_style_str("#ffffff");
            for ball in &state.balls {
                circle(ctx, ball.pos.x as f64 * s, ball.pos.y as f64 * s, ball.radius as f64 * s);
            }
            ctx.set_fill_style_str("#ffd166");
            for drop in &state.drops {
                circle(ctx, drop.pos.x as f64 * s, drop.pos.y as f64 * s, drop.radius as f64 * s);
            }
            for p in &state.particles {
                ctx.set_fill_style_str(&format!("#{:06x}", p.color & 0xff_ffff));
                let size = p.size as f64 * s;
                ctx.fill_rect(p.pos.x as f64 * s, p.pos.y as f64 * s, size, size);
            }
            if !self.settings.reduced_motion {
                ctx.set_fill_style_str("#ffffff");
                for text in &state.float_texts {
                    let _ = ctx.fill_text(&text.text, text.pos.x as f64 * s, text.pos.y as f64 * s);
                }
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&mut self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let state = self.session.state();

            set_text(&document, "#hud-score .hud-value", &state.score.to_string());
            set_text(&document, "#hud-level .hud-value", &state.level.to_string());
            let lives = state.lives.map_or("∞".to_string(), |l| l.to_string());
            set_text(&document, "#hud-lives .hud-value", &lives);
            let attempts = match self.session.mode() {
                GameMode::Daily => format!(
                    "{}/{}",
                    self.session.attempts().remaining,
                    self.session.attempts().cap()
                ),
                GameMode::Practice => "practice".to_string(),
            };
            set_text(&document, "#hud-attempts .hud-value", &attempts);
            set_text(
                &document,
                "#hud-streak .hud-value",
                &self.session.profile().streak.to_string(),
            );

            let combo = state.combo.current();
            set_visible(&document, "hud-combo", combo > 1);
            if combo > 1 {
                set_text(&document, "#hud-combo .hud-value", &format!("x{combo}"));
            }

            let phase = state.phase;
            set_visible(&document, "serve-prompt", phase == GamePhase::Idle);
            set_visible(&document, "pause-menu", phase == GamePhase::Paused);
            set_visible(&document, "game-over", phase == GamePhase::GameOver);
            set_visible(&document, "level-clear", phase == GamePhase::Win);
            if phase.is_terminal() {
                set_text(&document, "#final-score", &state.score.to_string());
                set_text(&document, "#final-level", &state.level.to_string());
            }

            let now = now_ms();
            for notice in self.session.take_notices() {
                if let Some(text) = notice_text(&notice) {
                    set_text(&document, "#toast", &text);
                    self.toast_until = now + 2500.0;
                }
            }
            set_visible(&document, "toast", now < self.toast_until);
        }
    }

    fn circle(ctx: &CanvasRenderingContext2d, x: f64, y: f64, r: f64) {
        ctx.begin_path();
        let _ = ctx.arc(x, y, r, 0.0, std::f64::consts::TAU);
        ctx.fill();
    }

    fn set_text(document: &web_sys::Document, selector: &str, text: &str) {
        if let Some(el) = document.query_selector(selector).ok().flatten() {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(document: &web_sys::Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    fn notice_text(notice: &SessionNotice) -> Option<String> {
        match notice {
            SessionNotice::Toast(text) => Some(text.clone()),
            SessionNotice::DailyReward(r) if r.bonus_attempts > 0 => Some(format!(
                "Day {} streak! +{} XP, +{} attempt",
                r.streak, r.xp, r.bonus_attempts
            )),
            SessionNotice::DailyReward(r) => Some(format!("Day {} streak! +{} XP", r.streak, r.xp)),
            SessionNotice::SkinUnlocked(id) => Some(format!("Skin unlocked: {id}")),
            SessionNotice::NewBest(score) => Some(format!("New best: {score}")),
            SessionNotice::LocalRank(rank) if *rank <= 3 => Some(format!("#{rank} today!")),
            SessionNotice::LocalRank(_) => None,
            SessionNotice::OutOfAttempts => Some("No attempts left today".to_string()),
        }
    }

    /// Send queued submissions and refresh the board when they land
    fn flush_outbox(game: &Rc<RefCell<Game>>) {
        let (requests, client) = {
            let mut g = game.borrow_mut();
            let requests = g.session.take_outbox();
            (requests, g.client.clone())
        };
        let Some(client) = client else { return };

        for request in requests {
            let game = game.clone();
            let client = client.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = client.submit(&request).await;
                game.borrow_mut().session.apply_submit_result(result);
                refresh_board(&game);
            });
        }
    }

    fn refresh_board(game: &Rc<RefCell<Game>>) {
        let (ticket, client) = {
            let mut g = game.borrow_mut();
            let Some(client) = g.client.clone() else { return };
            (g.session.begin_fetch(), client)
        };
        let game = game.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = client
                .fetch_top(&ticket.daily_id.to_string(), MAX_LIMIT)
                .await;
            game.borrow_mut().session.apply_fetch(ticket, result);
        });
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);

        log::info!("Brickfall starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()?;
        let dpr = window.device_pixel_ratio();
        let scale = (canvas.client_height() as f64 * dpr / FIELD_HEIGHT as f64) as f32;
        canvas.set_width((FIELD_WIDTH * scale) as u32);
        canvas.set_height((FIELD_HEIGHT * scale) as u32);
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into()?;

        let store = LocalStorageStore::open().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let mut repo = Repository::new(store);
        let settings = Settings::load(&mut repo);
        let player_id = settings.display_name("guest").to_string();
        let mode = if settings.practice_default {
            GameMode::Practice
        } else {
            GameMode::Daily
        };
        let session = GameSession::new(repo, player_id, DayKey::today(), mode, Tuning::default());
        let feedback = WebFeedback::new(settings.master_volume, settings.muted, settings.haptics);
        let client = settings.leaderboard_url.as_deref().map(LeaderboardClient::new);

        let game = Rc::new(RefCell::new(Game {
            session,
            settings,
            feedback,
            client,
            input: StepInput::default(),
            last_time: 0.0,
            scale: scale / dpr as f32,
            toast_until: 0.0,
        }));

        setup_input_handlers(&canvas, game.clone());
        setup_buttons(game.clone());
        setup_auto_pause(game.clone());
        refresh_board(&game);

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(game, Rc::new(ctx));
        log::info!("Brickfall running!");
        Ok(())
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Pointer move: paddle target
        {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                let mut g = game.borrow_mut();
                let rect = canvas_clone.get_bounding_client_rect();
                let x = (event.client_x() as f64 - rect.left()) as f32 / g.scale;
                g.input.pointer_x = Some(x);
                g.input.dragging = event.buttons() != 0;
            });
            let _ = canvas
                .add_event_listener_with_callback("pointermove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Pointer down: launch
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                let mut g = game.borrow_mut();
                g.feedback.resume();
                g.input.launch = true;
                g.input.dragging = true;
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Pointer up
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: PointerEvent| {
                game.borrow_mut().input.dragging = false;
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        {
            let Some(window) = web_sys::window() else { return };
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    " " | "Enter" => g.input.launch = true,
                    "Escape" | "p" | "P" => g.input.pause = true,
                    "m" | "M" => toggle_mute(&mut g),
                    _ => {}
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn toggle_mute(g: &mut Game) {
        let muted = g.settings.toggle_mute();
        g.feedback.set_muted(muted);
        if let Ok(store) = LocalStorageStore::open() {
            if let Err(e) = g.settings.save(&mut Repository::new(store)) {
                log::warn!("Could not save settings: {}", e);
            }
        }
        log::info!("Muted: {}", muted);
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>, ctx: Rc<CanvasRenderingContext2d>) {
        let Some(window) = web_sys::window() else { return };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, ctx, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, ctx: Rc<CanvasRenderingContext2d>, time: f64) {
        {
            let mut g = game.borrow_mut();
            let today = DayKey::today();
            if g.session.roll_day(today) {
                drop(g);
                refresh_board(&game);
                g = game.borrow_mut();
            }

            g.update(time);
            g.draw(&ctx);
            g.update_hud();
        }
        flush_outbox(&game);

        request_animation_frame(game, ctx);
    }

    fn on_click(id: &str, game: Rc<RefCell<Game>>, action: fn(&mut Game)) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        if let Some(btn) = document.get_element_by_id(id) {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                action(&mut game.borrow_mut());
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_buttons(game: Rc<RefCell<Game>>) {
        on_click("restart-btn", game.clone(), |g| g.session.reset_game());
        on_click("next-level-btn", game.clone(), |g| {
            let events = g.session.next_level();
            dispatch(&mut g.feedback, &events);
        });
        on_click("resume-btn", game.clone(), |g| g.input.pause = true);
        on_click("mute-btn", game.clone(), toggle_mute);
        on_click("practice-btn", game.clone(), |g| {
            let mode = match g.session.mode() {
                GameMode::Daily => GameMode::Practice,
                GameMode::Practice => GameMode::Daily,
            };
            g.session.set_mode(mode);
        });
        on_click("share-btn", game, |g| {
            let text = format!(
                "Brickfall {}: {} points, level {} (run at {:.0})",
                g.session.today(),
                g.session.state().score,
                g.session.state().level,
                wall_clock_ms()
            );
            log::info!("{}", text);
        });
    }

    fn setup_auto_pause(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else { return };
        let Some(document) = window.document() else { return };

        // Visibility change (tab switch, minimize)
        {
            let game = game.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    let mut g = game.borrow_mut();
                    if g.session.phase() == GamePhase::Running {
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
                if g.session.phase() == GamePhase::Running && g.settings.pause_on_blur {
                    g.input.pause = true;
                    log::info!("Auto-paused (window blur)");
                }
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use brickfall::consts::*;
    use brickfall::leaderboard::protocol::{parse_submit_response, parse_top_response};
    use brickfall::leaderboard::{DigestSigner, MAX_LIMIT, MemoryLeaderboard};
    use brickfall::persistence::{MemoryStore, Repository};
    use brickfall::platform::wall_clock_ms;
    use brickfall::session::SessionNotice;
    use brickfall::sim::{GamePhase, MatchState, StepInput};
    use brickfall::{DayKey, GameMode, GameSession, Tuning};

    const PLAYER: &str = "0xdemo";
    const FRAME_DT: f32 = 1.0 / 60.0;
    /// Levels the autopilot tries to clear before it lets the ball go
    const LEVELS_PER_RUN: u32 = 2;
    const MAX_FRAMES_PER_RUN: u64 = 60 * 60 * 20;

    /// Chase the lowest falling ball, aiming slightly off-center
    fn autopilot(state: &MatchState, frame: u64, give_up: bool) -> StepInput {
        let target = state
            .balls
            .iter()
            .filter(|b| b.launched && b.vel.y > 0.0)
            .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
            .or_else(|| state.balls.first())
            .map(|b| b.pos.x + 20.0 * (frame as f32 / 53.0).sin());

        let pointer_x = if give_up {
            target.map(|x| if x < FIELD_WIDTH / 2.0 { FIELD_WIDTH } else { 0.0 })
        } else {
            target
        };
        StepInput {
            pointer_x,
            dragging: true,
            launch: state.balls.iter().any(|b| !b.launched),
            pause: false,
        }
    }

    fn report(session: &mut GameSession) {
        for notice in session.take_notices() {
            match notice {
                SessionNotice::Toast(text) => log::info!("[toast] {}", text),
                other => log::info!("[notice] {:?}", other),
            }
        }
    }

    fn play_run(session: &mut GameSession, board: &mut MemoryLeaderboard, clock: &mut f64) {
        let mut frames = 0u64;
        loop {
            let give_up = session.state().level > LEVELS_PER_RUN || frames > MAX_FRAMES_PER_RUN;
            let input = autopilot(session.state(), frames, give_up);
            session.frame(&input, FRAME_DT, *clock);
            *clock += FRAME_DT as f64 * 1000.0;
            frames += 1;

            for request in session.take_outbox() {
                let body = serde_json::to_string(&request).unwrap_or_default();
                let (status, reply) = board.handle_submit(&body, chrono::Utc::now());
                session.apply_submit_result(parse_submit_response(status, &reply));
            }
            report(session);

            match session.phase() {
                GamePhase::Win => {
                    log::info!(
                        "Cleared level {} with {} points",
                        session.state().level,
                        session.state().score
                    );
                    session.next_level();
                }
                GamePhase::GameOver => {
                    log::info!(
                        "Run over: level {}, {} points, {} frames",
                        session.state().level,
                        session.state().score,
                        frames
                    );
                    return;
                }
                _ => {}
            }
        }
    }

    pub fn run() {
        let store = MemoryStore::new();
        let mut board = MemoryLeaderboard::default();
        let today = DayKey::today();
        let mut session = GameSession::new(
            Repository::new(store.clone()),
            PLAYER,
            today,
            GameMode::Daily,
            Tuning::default(),
        )
        .with_signer(DigestSigner::new(PLAYER));

        let mut clock = wall_clock_ms();
        while session.can_launch() {
            session.launch();
            report(&mut session);
            if session.phase() != GamePhase::Running {
                break;
            }
            play_run(&mut session, &mut board, &mut clock);
            session.reset_game();
        }

        // One more launch shows the attempt gate
        session.launch();
        report(&mut session);

        let ticket = session.begin_fetch();
        let reply = board.handle_top(&today.to_string(), MAX_LIMIT);
        session.apply_fetch(ticket, parse_top_response(&reply, MAX_LIMIT));

        println!("\nBrickfall daily {}", today);
        println!(
            "Profile: level {}, {} XP, best {}, streak {}",
            session.profile().level(),
            session.profile().xp,
            session.profile().best_score,
            session.profile().streak
        );
        println!("Local board:");
        for (i, entry) in session.high_scores().entries.iter().enumerate() {
            println!("  {:>2}. {:>6}  level {}", i + 1, entry.score, entry.level);
        }
        println!("Remote board:");
        for (i, entry) in session.remote_board().iter().enumerate() {
            println!(
                "  {:>2}. {}  {:>6}  level {}",
                i + 1,
                entry.address,
                entry.score,
                entry.level
            );
        }
        println!("Stored keys: {}", store.keys().join(", "));
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Brickfall (native) starting headless demo...");
    demo::run();
}
