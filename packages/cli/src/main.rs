mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use gravity_core::{math, Env, FarmParams, Protocol, ProtocolConfig, BPS_DENOMINATOR, PROGRAM_ID};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use scenario::{actor, Runner, Scenario, BLOCK_SECS};

fn print_banner() {
    let ver = env!("CARGO_PKG_VERSION");
    println!();
    println!("  Gravity  v{ver}  ·  constant-product exchange, farms and vaults");
    println!("  {}", "─".repeat(62));
    println!("  Program   {PROGRAM_ID}");
    println!("  Mode      local simulation, no network");
    println!("  Fees      0.30% swap (1/6 to fee_to when set)");
    println!();
}

// ─── CLI definition ───────────────────────────────────────────────────────────

/// Gravity simulator: replay scenarios against the exchange, farms and
/// compounding vaults.
///
/// Every command supports --json for machine-readable output.
#[derive(Parser)]
#[command(
    name         = "gravity-sim",
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"), "\n",
        "Program:   9uBFhnnevhZKyUh7Hu9Tr6qxe9XS1NX7jJHPiCHQgRit\n",
        "Swap fee:  30 bps default, 0-100 bps configurable\n",
        "License:   MIT",
    ),
    about = "Deterministic simulator for the Gravity exchange, reward farms and compounding vaults.",
    after_help = "\
ENVIRONMENT:
  GRAVITY_SCENARIO   Scenario file for `run`
  GRAVITY_JSON       Emit JSON (same as --json)
  RUST_LOG           Log filter  [default: warn]

QUICK START:
  gravity-sim run           --scenario scenarios/gfi-compound.json
  gravity-sim simulate-swap --reserve-in 1000000 --reserve-out 2000000 --amount 5000
  gravity-sim project-farm  --reward-per-block 1000 --start-block 10 --end-block 1010 \\
                            --stake 5000 --others 15000 --to 110"
)]
struct Cli {
    /// Output machine-readable JSON instead of human-readable text
    #[arg(long, global = true, env = "GRAVITY_JSON")]
    json: bool,

    /// Log every committed and reverted call
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON scenario and print per-step results plus the end state
    #[command(
        after_help = "\
EXAMPLES:
  gravity-sim run --scenario scenarios/gfi-compound.json
  GRAVITY_SCENARIO=my.json gravity-sim run --json

NOTES:
  A step with \"expect_error\": true must fail; any other failing step
  aborts the run. Names are hashed into addresses, LP:A/B names the A/B
  pair's LP token and farm ids name the farms they created."
    )]
    Run {
        /// Scenario file
        #[arg(long, value_name = "PATH", env = "GRAVITY_SCENARIO")]
        scenario: PathBuf,
    },

    /// Quote a single swap against explicit reserves
    #[command(
        after_help = "\
EXAMPLES:
  gravity-sim simulate-swap --reserve-in 1000000 --reserve-out 2000000 --amount 5000
  gravity-sim simulate-swap --reserve-in 1000000 --reserve-out 2000000 --amount 5000 --fee-bps 10"
    )]
    SimulateSwap {
        #[arg(long, value_name = "AMOUNT")]
        reserve_in: u64,

        #[arg(long, value_name = "AMOUNT")]
        reserve_out: u64,

        /// Exact input amount (atomic units)
        #[arg(long, value_name = "AMOUNT")]
        amount: u64,

        /// Swap fee in basis points
        #[arg(long, value_name = "BPS", default_value_t = 30)]
        fee_bps: u16,
    },

    /// Project the reward a stake earns in a farm between two blocks
    #[command(
        after_help = "\
EXAMPLES:
  # 5k of a 20k pool over 100 blocks at 1000/block
  gravity-sim project-farm --reward-per-block 1000 --start-block 10 --end-block 1010 \\
                           --stake 5000 --others 15000 --to 110

  # 10x bonus for the first 50 blocks, 2% harvest fee
  gravity-sim project-farm --reward-per-block 100 --start-block 1 --end-block 500 \\
                           --bonus-end-block 51 --bonus 10 --stake 1 --to 200 --harvest-fee-bps 200"
    )]
    ProjectFarm {
        #[arg(long, value_name = "AMOUNT")]
        reward_per_block: u64,

        #[arg(long, value_name = "BLOCK")]
        start_block: u64,

        #[arg(long, value_name = "BLOCK")]
        end_block: u64,

        /// Blocks before this earn --bonus times the base rate
        #[arg(long, value_name = "BLOCK")]
        bonus_end_block: Option<u64>,

        #[arg(long, default_value_t = 1)]
        bonus: u64,

        /// Your stake
        #[arg(long, value_name = "AMOUNT")]
        stake: u64,

        /// Everyone else's stake
        #[arg(long, value_name = "AMOUNT", default_value_t = 0)]
        others: u64,

        /// Block the stakes are deposited at  [default: --start-block]
        #[arg(long, value_name = "BLOCK")]
        from: Option<u64>,

        /// Block the reward is measured at
        #[arg(long, value_name = "BLOCK")]
        to: u64,

        /// Share of each payout burned
        #[arg(long, value_name = "BPS", default_value_t = 0)]
        harvest_fee_bps: u16,
    },
}

// ─── run ─────────────────────────────────────────────────────────────────────

fn cmd_run(path: &Path, json_output: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("parse scenario {}", path.display()))?;

    let mut runner = Runner::new(&scenario)?;
    let reports = runner.run(&scenario.steps)?;
    let summary = runner.summary()?;

    if json_output {
        let steps: Vec<Value> = reports
            .iter()
            .map(|r| {
                json!({
                    "index":  r.index,
                    "op":     r.op,
                    "block":  r.env.block,
                    "ok":     r.ok,
                    "detail": r.detail,
                })
            })
            .collect();
        println!("{}", json!({
            "status":   "ok",
            "command":  "run",
            "scenario": scenario.name,
            "steps":    steps,
            "summary":  summary,
        }));
        return Ok(());
    }

    let title = scenario.name.as_deref().unwrap_or("unnamed scenario");
    println!("─── Scenario ─────────────────────────────────────────────────────");
    println!("  {title}");
    println!();
    for r in &reports {
        let mark = if r.ok { "ok  " } else { "fail" };
        println!("  #{:<3} block {:>7}  {:<18} {mark}  {}", r.index, r.env.block, r.op, r.detail);
    }
    println!();

    println!("─── Balances ─────────────────────────────────────────────────────");
    if let Some(tokens) = summary["balances"].as_object() {
        for (token, holders) in tokens {
            println!("  {token}");
            if let Some(holders) = holders.as_object() {
                for (holder, amount) in holders {
                    println!("    {holder:<24} {:>20}", amount);
                }
            }
        }
    }
    println!();

    println!("─── Pairs ────────────────────────────────────────────────────────");
    for p in summary["pairs"].as_array().into_iter().flatten() {
        println!("  {}", p["pair"].as_str().unwrap_or("?"));
        println!("    Reserve A        {:>20}", p["reserve_a"]);
        println!("    Reserve B        {:>20}", p["reserve_b"]);
        println!("    LP supply        {:>20}", p["lp_supply"]);
    }
    println!();

    println!("─── Vaults ───────────────────────────────────────────────────────");
    for v in summary["vaults"].as_array().into_iter().flatten() {
        println!("  farm {}  ({})", v["farm"].as_str().unwrap_or("?"), v["kind"].as_str().unwrap_or("?"));
        println!("    Share supply     {:>20}", v["share_supply"]);
        println!("    Total value      {:>20}", v["total_value"]);
        println!("    Reward balance   {:>20}", v["reward_balance"]);
        println!("    Harvests         {:>20}", v["harvests"]);
    }
    Ok(())
}

// ─── simulate-swap ───────────────────────────────────────────────────────────

fn cmd_simulate_swap(
    reserve_in: u64,
    reserve_out: u64,
    amount: u64,
    fee_bps: u16,
    json_output: bool,
) -> Result<()> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(anyhow!("--reserve-in and --reserve-out must both be > 0"));
    }
    let sim = math::compute_swap(amount, fee_bps, reserve_in, reserve_out, 0)
        .context("swap does not clear")?;

    let spot = reserve_out as f64 / reserve_in as f64;
    let effective_rate = sim.amount_out as f64 / amount as f64;
    let price_impact_pct = (1.0 - effective_rate / spot) * 100.0;

    if json_output {
        println!("{}", json!({
            "status":           "ok",
            "command":          "simulate-swap",
            "amount_in":        amount,
            "fee":              sim.fee,
            "fee_bps":          fee_bps,
            "estimated_out":    sim.amount_out,
            "effective_rate":   effective_rate,
            "price_impact_pct": price_impact_pct,
            "reserve_in":       reserve_in,
            "reserve_out":      reserve_out,
        }));
    } else {
        println!("─── Swap Simulation ──────────────────────────────────────────────");
        println!("  Reserve in       {:>20}", reserve_in);
        println!("  Reserve out      {:>20}", reserve_out);
        println!("  Amount in        {:>20}", amount);
        println!("  Fee              {:>20}  ({:.2}%  →  reserves)", sim.fee, fee_bps as f64 / 100.0);
        println!("  Estimated out    {:>20}", sim.amount_out);
        println!("  Effective rate   {:>20.8}", effective_rate);
        println!("  Price impact     {:>19.4}%", price_impact_pct);
    }
    Ok(())
}

// ─── project-farm ────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_project_farm(
    reward_per_block: u64,
    start_block: u64,
    end_block: u64,
    bonus_end_block: Option<u64>,
    bonus: u64,
    stake: u64,
    others: u64,
    from: Option<u64>,
    to: u64,
    harvest_fee_bps: u16,
    json_output: bool,
) -> Result<()> {
    let from = from.unwrap_or(start_block);
    if from > to {
        return Err(anyhow!("--from {from} is after --to {to}"));
    }
    if stake == 0 {
        return Err(anyhow!("--stake must be > 0"));
    }

    let mut config = ProtocolConfig::default();
    config.farm.harvest_fee_bps = harvest_fee_bps;
    let mut protocol = Protocol::new(config).context("invalid farm config")?;
    protocol.set_env(Env { block: from, timestamp: from.saturating_mul(BLOCK_SECS) });

    let (staked, reward) = (actor("STAKE"), actor("REWARD"));
    let (creator, you, rest) = (actor("creator"), actor("you"), actor("others"));
    let mut params = FarmParams::new(staked, reward, 0, reward_per_block, start_block, end_block)
        .with_bonus(bonus_end_block.unwrap_or(start_block), bonus);
    params.reward_budget = params.full_budget().context("reward budget overflows u64")?;
    protocol.mint_tokens(&reward, &creator, params.reward_budget)?;
    protocol.mint_tokens(&staked, &you, stake)?;
    let farm = protocol.create_farm(&creator, params)?;
    protocol.farm_deposit(&you, &farm, stake)?;
    if others > 0 {
        protocol.mint_tokens(&staked, &rest, others)?;
        protocol.farm_deposit(&rest, &farm, others)?;
    }

    protocol.set_env(Env { block: to, timestamp: to.saturating_mul(BLOCK_SECS) });
    let pending = protocol.pending_reward(&farm, &you)?;
    let fee = math::to_u64(pending as u128 * harvest_fee_bps as u128 / BPS_DENOMINATOR)?;
    let multiplier = protocol.ledger().farm(&farm)?.get_multiplier(from, to);
    let share_pct = stake as f64 / (stake as f64 + others as f64) * 100.0;

    if json_output {
        println!("{}", json!({
            "status":           "ok",
            "command":          "project-farm",
            "from":             from,
            "to":               to,
            "reward_blocks":    multiplier.to_string(),
            "pool_share_pct":   share_pct,
            "pending_reward":   pending,
            "harvest_fee":      fee,
            "net_reward":       pending - fee,
        }));
    } else {
        println!("─── Farm Projection ──────────────────────────────────────────────");
        println!("  Blocks           {:>20}  ({from} → {to})", to - from);
        println!("  Reward blocks    {:>20}  (bonus-weighted)", multiplier);
        println!("  Pool share       {:>19.4}%", share_pct);
        println!("  Pending reward   {:>20}", pending);
        println!("  Harvest fee      {:>20}", fee);
        println!("  Net reward       {:>20}", pending - fee);
    }
    Ok(())
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    // When invoked with no arguments, show banner + full help and exit cleanly.
    if std::env::args().len() == 1 {
        print_banner();
        Cli::command().print_long_help().ok();
        println!();
        return Ok(());
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run { scenario } => {
            cmd_run(scenario, cli.json)?;
        }
        Commands::SimulateSwap { reserve_in, reserve_out, amount, fee_bps } => {
            cmd_simulate_swap(*reserve_in, *reserve_out, *amount, *fee_bps, cli.json)?;
        }
        Commands::ProjectFarm {
            reward_per_block,
            start_block,
            end_block,
            bonus_end_block,
            bonus,
            stake,
            others,
            from,
            to,
            harvest_fee_bps,
        } => {
            cmd_project_farm(
                *reward_per_block, *start_block, *end_block,
                *bonus_end_block, *bonus,
                *stake, *others, *from, *to, *harvest_fee_bps,
                cli.json,
            )?;
        }
    }
    Ok(())
}
