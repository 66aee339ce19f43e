//! Riftbound demo driver
//!
//! Command line front end for the encounter engine: generate combatants,
//! fight them, crawl a dungeon or besiege a world boss with a pack of
//! worker threads. Runs against the bundled demo catalog unless a catalog
//! file is supplied.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{Local, LocalResult, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rift_core::catalog::TemplateCatalog;
use rift_core::combat::{self, CombatMode, Verdict};
use rift_core::combatant::Combatant;
use rift_core::dungeon::{self, Expedition, ExpeditionState, FloorEvent};
use rift_core::errors::BossError;
use rift_core::generate;
use rift_core::storage::MemoryStore;
use rift_core::worldboss::{SpawnOutcome, WorldBossCoordinator};
use rift_core::{GameRng, Tuning};

const DEMO_CATALOG: &str = include_str!("../data/demo_catalog.json");

/// Riftbound encounter engine demo
#[derive(Parser, Debug)]
#[command(name = "riftbound")]
#[command(author, version, about = "Riftbound - encounters, dungeons and world bosses", long_about = None)]
struct Args {
    /// Template catalog JSON file (bundled demo catalog if omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a combatant from a template and print it
    Generate {
        /// Template id
        #[arg(long)]
        template: String,
        /// Scaling level
        #[arg(long, default_value_t = 1)]
        level: u32,
        /// Look the template up in the boss pool
        #[arg(long)]
        boss: bool,
    },
    /// Pit a hero against a generated monster
    Fight {
        /// Monster template id
        #[arg(long)]
        template: String,
        /// Monster scaling level
        #[arg(long, default_value_t = 1)]
        level: u32,
        /// Hero hit points
        #[arg(long, default_value_t = 120)]
        hp: i64,
        /// Hero attack
        #[arg(long, default_value_t = 18)]
        attack: i64,
        /// Hero defense
        #[arg(long, default_value_t = 6)]
        defense: i64,
    },
    /// Generate a dungeon, optionally walking it floor by floor
    Dungeon {
        /// Party level the dungeon is sized for
        #[arg(long, default_value_t = 1)]
        level: u32,
        /// Walk the dungeon with a demo party
        #[arg(long)]
        walk: bool,
    },
    /// Spawn a world boss and besiege it with attacker threads
    Siege {
        /// Boss template id (first configured boss if omitted)
        #[arg(long)]
        template: Option<String>,
        /// Number of attacker threads
        #[arg(long, default_value_t = 4)]
        attackers: usize,
    },
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<TemplateCatalog, String> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("cannot read catalog {}: {e}", path.display()))?,
        None => DEMO_CATALOG.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| format!("invalid catalog: {e}"))
}

fn format_time(epoch: u64) -> String {
    match Local.timestamp_opt(epoch as i64, 0) {
        LocalResult::Single(when) => when.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("@{epoch}"),
    }
}

fn print_combatant(combatant: &Combatant, level: u32) {
    println!("{} (level {} {})", combatant.name, level, combatant.kind);
    println!(
        "  hp {}/{}  attack {}  defense {}",
        combatant.stats.hp, combatant.stats.hp_max, combatant.stats.attack, combatant.stats.defense
    );
    println!(
        "  bounty: {} gold, {} experience",
        combatant.rewards.gold, combatant.rewards.experience
    );
    let mut items: Vec<_> = combatant.rewards.items.iter().collect();
    items.sort();
    for (item, amount) in items {
        println!("  drops {amount}x {item}");
    }
}

fn run_generate(
    catalog: &TemplateCatalog,
    template: &str,
    level: u32,
    boss: bool,
    rng: &mut GameRng,
) -> Result<(), String> {
    let combatant = if boss {
        generate::create_boss(catalog, template, level, rng)
    } else {
        generate::create_monster(catalog, template, level, rng)
    }
    .map_err(|e| e.to_string())?;
    print_combatant(&combatant, level);
    Ok(())
}

fn run_fight(
    catalog: &TemplateCatalog,
    template: &str,
    level: u32,
    hero: Combatant,
    tuning: &Tuning,
    rng: &mut GameRng,
) -> Result<(), String> {
    let enemy = generate::create_monster(catalog, template, level, rng).map_err(|e| e.to_string())?;
    let outcome = combat::resolve(hero, enemy, CombatMode::Pve, tuning);

    for line in &outcome.log {
        println!("{line}");
    }
    if outcome.verdict == Verdict::Victory {
        println!(
            "Spoils: {} gold, {} experience",
            outcome.defender.rewards.gold, outcome.defender.rewards.experience
        );
        let mut items: Vec<_> = outcome.defender.rewards.items.iter().collect();
        items.sort();
        for (item, amount) in items {
            println!("  {amount}x {item}");
        }
    }
    Ok(())
}

fn run_dungeon(
    catalog: &TemplateCatalog,
    level: u32,
    walk: bool,
    tuning: &Tuning,
    rng: &mut GameRng,
) -> Result<(), String> {
    let instance = dungeon::generate(catalog, level, tuning, rng).map_err(|e| e.to_string())?;

    println!(
        "Dungeon {}: {} floors for a level {} party",
        instance.id, instance.total_floors, level
    );
    for (i, event) in instance.floors.iter().enumerate() {
        let line = match event {
            FloorEvent::Monster { template_id } => format!("monster: {template_id}"),
            FloorEvent::Boss { template_id } => format!("boss: {template_id}"),
            FloorEvent::Treasure { gold } => format!("treasure: {gold} gold"),
            FloorEvent::Empty => "empty".to_string(),
        };
        println!("  floor {}: {line}", i + 1);
    }
    if !walk {
        return Ok(());
    }

    // sized to out-trade the final floor's boss
    let base = i64::from(level);
    let mut party = Combatant::player("The party", 2400 + 400 * base, 60 + 15 * base, 20 + 5 * base);
    let mut expedition = Expedition::new(instance);

    println!();
    while expedition.state() == ExpeditionState::Exploring {
        let report = expedition
            .advance(&mut party, catalog, tuning, rng)
            .map_err(|e| e.to_string())?;
        for line in &report.log {
            println!("{line}");
        }
        if let Some(outcome) = &report.combat {
            for line in &outcome.log {
                tracing::debug!("{line}");
            }
        }
    }

    let gained = expedition.gained();
    println!();
    match expedition.state() {
        ExpeditionState::Completed => println!(
            "Expedition complete: {} gold, {} experience earned.",
            gained.gold, gained.experience
        ),
        ExpeditionState::Defeated => println!(
            "The party limps home with {} gold and {} experience.",
            gained.gold, gained.experience
        ),
        ExpeditionState::Exploring => {}
    }
    let mut items: Vec<_> = gained.items.iter().collect();
    items.sort();
    for (item, amount) in items {
        println!("  looted {amount}x {item}");
    }
    Ok(())
}

fn run_siege(
    catalog: TemplateCatalog,
    template: Option<String>,
    attackers: usize,
    tuning: Tuning,
    rng: GameRng,
) -> Result<(), String> {
    let catalog = Arc::new(catalog);
    let template_id = match template {
        Some(id) => id,
        None => catalog
            .boss_ids()
            .first()
            .cloned()
            .ok_or_else(|| "no boss templates configured".to_string())?,
    };

    let store = Arc::new(MemoryStore::new());
    // a small roster so boss scaling has something to look at
    for (name, level) in [("runa", 6), ("aldric", 5), ("mirek", 4)] {
        store.upsert_player(name, level).map_err(|e| e.to_string())?;
    }
    // the raiders need records of their own for settlement to credit
    for worker in 0..attackers.max(1) {
        store
            .upsert_player(&format!("raider_{worker}"), 1)
            .map_err(|e| e.to_string())?;
    }
    let coordinator = Arc::new(WorldBossCoordinator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Arc::clone(&store),
        tuning,
        rng,
    ));

    match coordinator
        .ensure_spawned(&template_id)
        .map_err(|e| e.to_string())?
    {
        SpawnOutcome::Spawned { level } => println!("{template_id} rises at level {level}"),
        SpawnOutcome::AlreadyActive => println!("{template_id} is already active"),
        SpawnOutcome::OnCooldown { until } => {
            println!("{template_id} is cooling down until {}", format_time(until));
            return Ok(());
        }
    }
    for status in coordinator.active_sessions() {
        println!(
            "  {} [level {}] {}/{} hp, spawned {}",
            status.name,
            status.level,
            status.hp,
            status.hp_max,
            format_time(status.spawned_at)
        );
    }

    let level = coordinator.scaling_level().map_err(|e| e.to_string())?;
    let base = i64::from(level);

    let mut handles = Vec::new();
    for worker in 0..attackers.max(1) {
        let coordinator = Arc::clone(&coordinator);
        let template_id = template_id.clone();
        handles.push(thread::spawn(move || {
            let attacker_id = format!("raider_{worker}");
            let attacker =
                Combatant::player(attacker_id.clone(), 80 + 20 * base, 30 + 15 * base, 10);
            let mut bouts = 0u32;
            loop {
                match coordinator.attack(&template_id, &attacker_id, &attacker) {
                    Ok(report) => {
                        bouts += 1;
                        tracing::debug!(
                            attacker = %attacker_id,
                            damage = report.damage,
                            remaining = report.remaining_hp,
                            "bout resolved"
                        );
                        if report.defeated {
                            return (attacker_id, bouts, true);
                        }
                    }
                    Err(BossError::AlreadyDefeated | BossError::NoSuchSession { .. }) => {
                        return (attacker_id, bouts, false);
                    }
                    Err(err) => {
                        tracing::error!(attacker = %attacker_id, error = %err, "attack failed");
                        return (attacker_id, bouts, false);
                    }
                }
            }
        }));
    }

    for handle in handles {
        match handle.join() {
            Ok((attacker_id, bouts, true)) => {
                println!("{attacker_id} lands the final blow after {bouts} bout(s)");
            }
            Ok((attacker_id, bouts, false)) => {
                println!("{attacker_id} retires after {bouts} bout(s)");
            }
            Err(_) => return Err("attacker thread panicked".to_string()),
        }
    }

    let ledger = coordinator.settle(&template_id).map_err(|e| e.to_string())?;
    println!(
        "\n{} falls. {} total damage across {} attacker(s).",
        ledger.boss_name,
        ledger.total_damage,
        ledger.shares.len()
    );
    for share in &ledger.shares {
        println!(
            "  {}: {} damage -> {} gold, {} experience",
            share.attacker_id, share.damage, share.gold, share.experience
        );
        let mut items: Vec<_> = share.items.iter().collect();
        items.sort();
        for (item, amount) in items {
            println!("    {amount}x {item}");
        }
    }
    Ok(())
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    init_logging(args.verbose);

    let catalog = load_catalog(args.catalog.as_deref())?;
    let mut rng = match args.seed {
        Some(seed) => GameRng::new(seed),
        None => GameRng::from_entropy(),
    };
    let tuning = Tuning::default();

    match args.command {
        Command::Generate {
            template,
            level,
            boss,
        } => run_generate(&catalog, &template, level, boss, &mut rng),
        Command::Fight {
            template,
            level,
            hp,
            attack,
            defense,
        } => {
            let hero = Combatant::player("Hero", hp, attack, defense);
            run_fight(&catalog, &template, level, hero, &tuning, &mut rng)
        }
        Command::Dungeon { level, walk } => run_dungeon(&catalog, level, walk, &tuning, &mut rng),
        Command::Siege {
            template,
            attackers,
        } => run_siege(catalog, template, attackers, tuning, rng),
    }
}
