//! Admin web server for the arena: robots, tournaments, rounds, league upkeep.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT.
//! Optional env: ARENA_CONFIG (JSON config file), ARENA_ROBOTS (JSON robot
//! roster), ARENA_SCHEDULE_SECS (run the round scheduler every N seconds).

use actix_web::{
    get, post,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use robot_arena::{
    create_tournament, eligible_robots, events_to_csv, finish_round, plan_round, rebalance,
    run_league_battle, start_tournament, ArenaConfig, AttributeSet, InMemoryRobots, LeagueError,
    Loadout, Robot, RobotId, RobotRepository, RoundStart, RoundSummary, Stance, TournamentError,
    TournamentId, TournamentRunner,
};
use serde::Deserialize;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Everything the server mutates, behind one lock: a round writes robots and
/// the tournament together.
struct Arena {
    runner: TournamentRunner,
    robots: InMemoryRobots,
}

type AppState = Data<RwLock<Arena>>;
type Settings = Data<ArenaConfig>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewRobotBody {
    name: String,
    attributes: AttributeSet,
    loadout: Loadout,
    #[serde(default)]
    stance: Stance,
    #[serde(default)]
    yield_threshold: f64,
    elo: Option<i32>,
}

#[derive(Deserialize, Default)]
struct CreateTournamentBody {
    name: Option<String>,
    seed: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeagueBattleBody {
    robot1_id: RobotId,
    robot2_id: RobotId,
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct TournamentPath {
    id: TournamentId,
}

#[derive(Deserialize)]
struct RobotPath {
    id: RobotId,
}

#[derive(Deserialize)]
struct BattlePath {
    id: TournamentId,
    battle_id: Uuid,
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn tournament_error(e: TournamentError) -> HttpResponse {
    match e {
        TournamentError::TournamentNotFound(_) | TournamentError::MatchNotFound(_) => {
            HttpResponse::NotFound().json(error_body(e.to_string()))
        }
        TournamentError::ConcurrencyViolation { .. } | TournamentError::RoundInProgress => {
            HttpResponse::Conflict().json(error_body(e.to_string()))
        }
        _ => HttpResponse::BadRequest().json(error_body(e.to_string())),
    }
}

fn lock_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("lock error")
}

/// Why a round could not be run to the end.
enum RoundFailure {
    Lock,
    Worker(String),
    Tournament(TournamentError),
}

impl fmt::Display for RoundFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => write!(f, "lock error"),
            Self::Worker(msg) => write!(f, "battle worker failed: {msg}"),
            Self::Tournament(e) => write!(f, "{e}"),
        }
    }
}

/// Run the current round of one tournament. The lock is only held to plan the
/// round and to write it back; the battles are fought on the blocking pool
/// while the tournament stays checked out, so a second run or a cancel in the
/// meantime gets `RoundInProgress`.
async fn run_round(
    state: &AppState,
    settings: &Settings,
    id: TournamentId,
) -> Result<RoundSummary, RoundFailure> {
    let (mut tournament, plan) = {
        let mut g = state.write().map_err(|_| RoundFailure::Lock)?;
        let Arena { runner, robots } = &mut *g;
        let tournament = runner.checkout(id).map_err(RoundFailure::Tournament)?;
        match plan_round(&tournament, &*robots) {
            Ok(RoundStart::Plan(plan)) => (tournament, plan),
            Ok(RoundStart::Done(summary)) => {
                runner.release(id);
                return Ok(summary);
            }
            Err(e) => {
                runner.release(id);
                return Err(RoundFailure::Tournament(e));
            }
        }
    };

    log::debug!("Tournament {}: fighting {} match(es)", id, plan.len());
    let config = settings.clone();
    let resolved = tokio::task::spawn_blocking(move || plan.resolve(&config)).await;

    // The guard must be released whatever happened while unlocked.
    let mut g = state.write().unwrap_or_else(PoisonError::into_inner);
    let Arena { runner, robots } = &mut *g;
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            runner.release(id);
            return Err(RoundFailure::Worker(e.to_string()));
        }
    };
    let outcome = finish_round(&mut tournament, robots, resolved, settings);
    runner.checkin(tournament);
    outcome.map_err(RoundFailure::Tournament)
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "robot-arena",
    })
}

/// All robots, ordered by id.
#[get("/api/robots")]
async fn api_list_robots(state: AppState) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    HttpResponse::Ok().json(g.robots.all())
}

/// Register a robot (full HP/shield, bronze league).
#[post("/api/robots")]
async fn api_add_robot(state: AppState, settings: Settings, body: Json<NewRobotBody>) -> HttpResponse {
    let body = body.into_inner();
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(error_body("Robot name is required".into()));
    }
    if let Err(e) = body.loadout.validate() {
        return HttpResponse::BadRequest().json(error_body(e.to_string()));
    }
    let mut robot = Robot::new(
        body.name.trim(),
        body.attributes,
        body.loadout,
        body.elo.unwrap_or(settings.rating.starting_elo),
    );
    robot.stance = body.stance;
    robot.yield_threshold = body.yield_threshold.clamp(0.0, 100.0);
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    log::info!("Registered robot {} ({})", robot.name, robot.id);
    g.robots.save(robot.clone());
    HttpResponse::Created().json(robot)
}

/// Restore a robot to full HP and shield.
#[post("/api/robots/{id}/repair")]
async fn api_repair_robot(state: AppState, path: Path<RobotPath>) -> HttpResponse {
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match g.robots.get(path.id) {
        Some(mut robot) => {
            robot.repair();
            g.robots.save(robot.clone());
            HttpResponse::Ok().json(robot)
        }
        None => HttpResponse::NotFound().json(error_body("No robot".into())),
    }
}

/// Ids of robots ready for a tournament.
#[get("/api/robots/eligible")]
async fn api_eligible_robots(state: AppState, settings: Settings) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    HttpResponse::Ok().json(eligible_robots(&g.robots, &settings.tournament))
}

/// Create a tournament from every eligible robot and generate its bracket.
#[post("/api/tournaments")]
async fn api_create_tournament(
    state: AppState,
    settings: Settings,
    body: Option<Json<CreateTournamentBody>>,
) -> HttpResponse {
    let body = body.map(|b| b.into_inner()).unwrap_or_default();
    let seed = body.seed.unwrap_or_else(rand::random);
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let name = body
        .name
        .unwrap_or_else(|| format!("Tournament #{}", g.runner.list().len() + 1));
    let mut tournament = match create_tournament(name, &g.robots, &settings, seed) {
        Ok(t) => t,
        Err(e) => return tournament_error(e),
    };
    if let Err(e) = start_tournament(&mut tournament, &settings) {
        return tournament_error(e);
    }
    let id = g.runner.insert(tournament);
    match g.runner.get(id) {
        Some(t) => HttpResponse::Created().json(t),
        None => HttpResponse::NotFound().json(error_body("No tournament".into())),
    }
}

#[get("/api/tournaments")]
async fn api_list_tournaments(state: AppState) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    HttpResponse::Ok().json(g.runner.list())
}

#[get("/api/tournaments/{id}")]
async fn api_get_tournament(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match g.runner.get(path.id) {
        Some(t) => HttpResponse::Ok().json(t),
        None => tournament_error(TournamentError::TournamentNotFound(path.id)),
    }
}

/// Execute the current round. Safe to repeat: a finished tournament returns its last round.
#[post("/api/tournaments/{id}/rounds/execute")]
async fn api_execute_round(
    state: AppState,
    settings: Settings,
    path: Path<TournamentPath>,
) -> HttpResponse {
    match run_round(&state, &settings, path.id).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(RoundFailure::Tournament(e)) => tournament_error(e),
        Err(RoundFailure::Lock) => lock_error(),
        Err(e @ RoundFailure::Worker(_)) => {
            log::error!("Tournament {}: {}", path.id, e);
            HttpResponse::InternalServerError().json(error_body(e.to_string()))
        }
    }
}

/// Cancel now, or at the end of the current round if it is partially resolved.
#[post("/api/tournaments/{id}/cancel")]
async fn api_cancel_tournament(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match g.runner.cancel(path.id) {
        Ok(status) => HttpResponse::Ok().json(serde_json::json!({ "status": status })),
        Err(e) => tournament_error(e),
    }
}

/// Full battle record including the event log.
#[get("/api/tournaments/{id}/battles/{battle_id}")]
async fn api_get_battle(state: AppState, path: Path<BattlePath>) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let Some(tournament) = g.runner.get(path.id) else {
        return tournament_error(TournamentError::TournamentNotFound(path.id));
    };
    match tournament.battle(path.battle_id) {
        Some(battle) => HttpResponse::Ok().json(battle),
        None => HttpResponse::NotFound().json(error_body("No battle".into())),
    }
}

/// Event log of one battle as CSV.
#[get("/api/tournaments/{id}/battles/{battle_id}/events.csv")]
async fn api_battle_events_csv(state: AppState, path: Path<BattlePath>) -> HttpResponse {
    let g = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let Some(battle) = g
        .runner
        .get(path.id)
        .and_then(|t| t.battle(path.battle_id))
    else {
        return HttpResponse::NotFound().json(error_body("No battle".into()));
    };
    match events_to_csv(&battle.result) {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .body(csv),
        Err(e) => HttpResponse::InternalServerError().json(error_body(e.to_string())),
    }
}

/// Fight one league battle between two robots.
#[post("/api/league/battles")]
async fn api_league_battle(
    state: AppState,
    settings: Settings,
    body: Json<LeagueBattleBody>,
) -> HttpResponse {
    let seed = body.seed.unwrap_or_else(rand::random);
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match run_league_battle(&mut g.robots, body.robot1_id, body.robot2_id, &settings, seed) {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e @ LeagueError::RobotNotFound(_)) => {
            HttpResponse::NotFound().json(error_body(e.to_string()))
        }
        Err(e) => HttpResponse::BadRequest().json(error_body(e.to_string())),
    }
}

/// Promote/demote robots between league tiers.
#[post("/api/league/rebalance")]
async fn api_league_rebalance(state: AppState, settings: Settings) -> HttpResponse {
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    HttpResponse::Ok().json(rebalance(&mut g.robots, &settings.league))
}

/// One scheduler pass: run the next round of every active tournament, then
/// open a new tournament if none is running and enough robots are ready.
async fn scheduler_tick(state: &AppState, settings: &Settings) {
    let active = match state.read() {
        Ok(g) => g.runner.active_ids(),
        Err(_) => return,
    };
    for id in active {
        match run_round(state, settings, id).await {
            Ok(_) => {}
            Err(RoundFailure::Tournament(TournamentError::RoundInProgress)) => {
                log::debug!("Tournament {} round already running, skipped", id);
            }
            Err(e) => log::warn!("Scheduled round for tournament {} failed: {}", id, e),
        }
    }
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return,
    };
    let Arena { runner, robots } = &mut *g;
    match runner.auto_create(&*robots, settings, rand::random()) {
        Ok(Some(id)) => log::info!("Scheduler opened tournament {}", id),
        Ok(None) => {}
        Err(e) => log::warn!("Scheduler could not open a tournament: {}", e),
    }
}

fn load_config() -> ArenaConfig {
    match std::env::var("ARENA_CONFIG") {
        Ok(path) => match ArenaConfig::load_from_path(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                ArenaConfig::default()
            }
        },
        Err(_) => ArenaConfig::default(),
    }
}

fn load_robots() -> InMemoryRobots {
    let Ok(path) = std::env::var("ARENA_ROBOTS") else {
        return InMemoryRobots::new();
    };
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<Vec<Robot>>(&raw).map_err(|e| e.to_string()));
    match parsed {
        Ok(robots) => {
            log::info!("Loaded {} robot(s) from {}", robots.len(), path);
            robots.into_iter().collect()
        }
        Err(e) => {
            log::warn!("Cannot load robots from {}: {}", path, e);
            InMemoryRobots::new()
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let settings = Data::new(load_config());
    let state = Data::new(RwLock::new(Arena {
        runner: TournamentRunner::new(),
        robots: load_robots(),
    }));

    let schedule_secs: Option<u64> = std::env::var("ARENA_SCHEDULE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0);
    if let Some(secs) = schedule_secs {
        log::info!("Round scheduler runs every {}s", secs);
        let state_scheduler = state.clone();
        let settings_scheduler = settings.clone();
        actix_web::rt::spawn(async move {
            let mut interval = actix_web::rt::time::interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                scheduler_tick(&state_scheduler, &settings_scheduler).await;
            }
        });
    }

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(settings.clone())
            .service(api_health)
            .service(api_list_robots)
            .service(api_eligible_robots)
            .service(api_add_robot)
            .service(api_repair_robot)
            .service(api_create_tournament)
            .service(api_list_tournaments)
            .service(api_get_tournament)
            .service(api_execute_round)
            .service(api_cancel_tournament)
            .service(api_battle_events_csv)
            .service(api_get_battle)
            .service(api_league_battle)
            .service(api_league_rebalance)
    })
    .bind(bind)?
    .run()
    .await
}
