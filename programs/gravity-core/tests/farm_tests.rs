//! Reward farm accrual, lifecycle and funding through the runtime.

mod common;

use common::{actor, World};
use gravity_core::{FarmParams, GravityError};

/// GFI-staked, WETH-paying farm: 1_000 per block over blocks 10..=1_010.
fn weth_farm(w: &mut World) -> solana_sdk::pubkey::Pubkey {
    let (gfi, weth) = (w.gfi, w.weth);
    w.farm(gfi, weth, 1_000, 10, 1_010)
}

#[test]
fn test_single_staker_earns_n_times_rate() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();

    w.step(25);
    assert_eq!(w.p.pending_reward(&farm, &alice).unwrap(), 25_000);

    let receipt = w.p.farm_withdraw(&alice, &farm, 1_000).unwrap();
    assert_eq!(receipt.reward_paid, 25_000);
    assert_eq!(receipt.staked, 0);
    assert_eq!(w.balance(&w.weth, &alice), 25_000);
    assert_eq!(w.balance(&w.gfi, &alice), 1_000);
}

#[test]
fn test_equal_stakers_each_earn_half() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let gfi = w.gfi;
    let alice = w.user("alice", &[(gfi, 1_000)]);
    let bob = w.user("bob", &[(gfi, 1_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();
    w.p.farm_deposit(&bob, &farm, 1_000).unwrap();

    w.step(30);
    assert_eq!(w.p.pending_reward(&farm, &alice).unwrap(), 15_000);
    assert_eq!(w.p.pending_reward(&farm, &bob).unwrap(), 15_000);
}

#[test]
fn test_same_block_round_trip_pays_zero() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let gfi = w.gfi;
    let early = w.user("early", &[(gfi, 5_000)]);
    let alice = w.user("alice", &[(gfi, 777)]);
    w.step(9);
    w.p.farm_deposit(&early, &farm, 5_000).unwrap();
    w.step(40);

    w.p.farm_deposit(&alice, &farm, 777).unwrap();
    let receipt = w.p.farm_withdraw(&alice, &farm, 777).unwrap();
    assert_eq!(receipt.reward_paid, 0);
    assert_eq!(w.balance(&w.weth, &alice), 0);
}

#[test]
fn test_nothing_accrues_before_start() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();
    w.step(8);
    assert_eq!(w.p.pending_reward(&farm, &alice).unwrap(), 0);
    // Block 9 -> 14: four active blocks (10..14).
    w.step(5);
    assert_eq!(w.p.pending_reward(&farm, &alice).unwrap(), 4_000);
}

#[test]
fn test_dead_farm_refuses_deposit_and_pays_out_on_withdraw() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let gfi = w.gfi;
    let alice = w.user("alice", &[(gfi, 2_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();

    w.step(1_500);
    assert_eq!(
        w.p.farm_deposit(&alice, &farm, 1_000).unwrap_err(),
        GravityError::FarmDead { end_block: 1_010 }
    );
    assert_eq!(
        w.p.farm_deposit(&alice, &farm, 0).unwrap_err(),
        GravityError::FarmDead { end_block: 1_010 }
    );
    let receipt = w.p.farm_withdraw(&alice, &farm, 1_000).unwrap();
    assert_eq!(receipt.reward_paid, 1_000_000);
    assert_eq!(w.p.ledger().farm(&farm).unwrap().reward_remaining(), 0);
}

#[test]
fn test_zero_deposit_harvests_while_live() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();
    w.step(12);

    let receipt = w.p.farm_deposit(&alice, &farm, 0).unwrap();
    assert_eq!(receipt.reward_paid, 12_000);
    assert_eq!(receipt.staked, 1_000);
    assert_eq!(w.p.pending_reward(&farm, &alice).unwrap(), 0);
}

#[test]
fn test_emergency_withdraw_forfeits_reward() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();
    w.step(50);

    assert_eq!(w.p.emergency_withdraw(&alice, &farm).unwrap(), 1_000);
    assert_eq!(w.p.emergency_withdraw(&alice, &farm).unwrap(), 0);
    assert_eq!(w.balance(&w.gfi, &alice), 1_000);
    assert_eq!(w.balance(&w.weth, &alice), 0);
    assert_eq!(w.p.staked_balance(&farm, &alice).unwrap(), 0);
}

#[test]
fn test_harvest_fee_goes_to_incinerator() {
    let mut w = World::with_config(|c| c.farm.harvest_fee_bps = 1_000);
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.step(9);
    w.p.farm_deposit(&alice, &farm, 1_000).unwrap();
    w.step(10);

    let receipt = w.p.farm_deposit(&alice, &farm, 0).unwrap();
    assert_eq!(receipt.reward_paid, 9_000);
    assert_eq!(receipt.fee_burned, 1_000);
    assert_eq!(w.p.ledger().incinerator.burned(&w.weth), 1_000);
    assert_eq!(w.p.total_supply(&w.weth), 1_000_000 - 1_000);
}

#[test]
fn test_farms_on_same_assets_get_sequence_indices() {
    let mut w = World::new();
    let (gfi, weth) = (w.gfi, w.weth);
    let first = w.farm(gfi, weth, 10, 5, 100);
    let second = w.farm(gfi, weth, 20, 5, 100);
    assert_ne!(first, second);
    assert_eq!(w.p.farms_for(&gfi, &weth), vec![first, second]);
    assert_eq!(w.p.ledger().farm(&first).unwrap().index(), 1);
    assert_eq!(w.p.ledger().farm(&second).unwrap().index(), 2);
    assert!(w.p.farms_for(&weth, &gfi).is_empty());
}

#[test]
fn test_unfunded_farm_is_not_created() {
    let mut w = World::new();
    let (gfi, weth) = (w.gfi, w.weth);
    let broke = actor("broke");
    let params = FarmParams::new(gfi, weth, 50_000, 500, 5, 105);
    assert!(matches!(
        w.p.create_farm(&broke, params).unwrap_err(),
        GravityError::InsufficientBalance { .. }
    ));
    assert!(w.p.farms_for(&gfi, &weth).is_empty());
}

#[test]
fn test_over_withdraw_rejected() {
    let mut w = World::new();
    let farm = weth_farm(&mut w);
    let alice = w.user("alice", &[(w.gfi, 1_000)]);
    w.p.farm_deposit(&alice, &farm, 600).unwrap();
    assert_eq!(
        w.p.farm_withdraw(&alice, &farm, 601).unwrap_err(),
        GravityError::WithdrawExceedsStake { requested: 601, staked: 600 }
    );
}
