// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use common::{FakeGateway, USER, dec, input, recorder, stat, user};
use rust_decimal::Decimal;
use spendsync::binder::{Phase, View};
use spendsync::cache::{Freshness, QueryKind};
use spendsync::models::{Category, CategoryStat, TransactionInput};
use spendsync::session::Session;
use spendsync::stats::aggregate;
use spendsync::Error;

fn seeded(gateway: FakeGateway) -> Session<FakeGateway> {
    gateway.seed(USER, Category::Expense, "50");
    gateway.seed(USER, Category::Saving, "100");
    Session::new(gateway, user())
}

fn statistics_of(session: &mut Session<FakeGateway>) -> Vec<CategoryStat> {
    let key = session.statistics_key();
    session.load(&key).unwrap().statistics().unwrap().to_vec()
}

fn walk_through_delete_and_update(mut session: Session<FakeGateway>) {
    assert_eq!(
        statistics_of(&mut session),
        vec![stat(Category::Expense, "50"), stat(Category::Saving, "100")]
    );

    session.delete("f-1").unwrap();
    assert_eq!(statistics_of(&mut session), vec![stat(Category::Saving, "100")]);

    let key = session.transactions_key();
    session.load(&key).unwrap();
    let mut raise = TransactionInput::from(session.transaction("f-2").unwrap());
    raise.amount = dec("150");
    let saved = session.save(raise).unwrap();
    assert_eq!(saved.amount, dec("150"));
    assert_eq!(statistics_of(&mut session), vec![stat(Category::Saving, "150")]);
}

#[test]
fn totals_follow_deletes_and_updates() {
    walk_through_delete_and_update(seeded(FakeGateway::new()));
}

#[test]
fn derived_totals_follow_deletes_and_updates() {
    walk_through_delete_and_update(seeded(FakeGateway::without_server_stats()));
}

#[test]
fn derived_totals_reuse_the_fresh_list() {
    let mut session = seeded(FakeGateway::without_server_stats());
    let list = session.transactions_key();
    session.load(&list).unwrap();
    assert_eq!(session.gateway().list_calls.get(), 1);

    let stats = statistics_of(&mut session);
    assert_eq!(stats, vec![stat(Category::Expense, "50"), stat(Category::Saving, "100")]);
    assert_eq!(session.gateway().stats_calls.get(), 1);
    assert_eq!(session.gateway().list_calls.get(), 1);
}

#[test]
fn load_is_cache_first() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    session.load(&key).unwrap();
    session.load(&key).unwrap();
    assert_eq!(session.gateway().stats_calls.get(), 1);

    session.refresh(&key).unwrap();
    assert_eq!(session.gateway().stats_calls.get(), 2);
}

#[test]
fn refetch_without_change_is_identical() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    let first = session.refresh(&key).unwrap();
    let second = session.refresh(&key).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(first.statistics().unwrap()).unwrap(),
        serde_json::to_string(second.statistics().unwrap()).unwrap()
    );
}

#[test]
fn watch_goes_from_loading_to_ready() {
    let mut session = seeded(FakeGateway::new());
    let (seen, cb) = recorder();
    let key = session.transactions_key();
    session.watch(key, cb).unwrap();

    let phases: Vec<Phase> = seen.borrow().iter().map(|v| v.phase).collect();
    assert_eq!(phases, vec![Phase::Loading, Phase::Ready]);
    let last = seen.borrow().last().cloned().unwrap();
    assert!(last.is_ready());
    assert_eq!(last.transactions().unwrap().len(), 2);
}

#[test]
fn watch_of_fresh_key_does_not_fetch() {
    let mut session = seeded(FakeGateway::new());
    let key = session.transactions_key();
    session.load(&key).unwrap();

    let (seen, cb) = recorder();
    session.watch(key, cb).unwrap();
    assert_eq!(session.gateway().list_calls.get(), 1);
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].phase, Phase::Ready);
}

#[test]
fn description_edit_does_not_refetch_totals() {
    let mut session = seeded(FakeGateway::new());
    statistics_of(&mut session);
    let key = session.transactions_key();
    session.load(&key).unwrap();
    let calls = session.gateway().stats_calls.get();

    let mut note = TransactionInput::from(session.transaction("f-1").unwrap());
    note.description = "groceries".into();
    session.save(note).unwrap();

    assert_eq!(session.gateway().stats_calls.get(), calls);
    assert_eq!(
        session.cache().freshness(&session.statistics_key()),
        Freshness::Fresh
    );
    assert_eq!(session.transaction("f-1").unwrap().description, "groceries");
}

#[test]
fn subscribers_never_see_a_torn_pair() {
    let mut session = seeded(FakeGateway::new());
    let log: Rc<RefCell<Vec<View>>> = Rc::new(RefCell::new(Vec::new()));
    for key in [session.transactions_key(), session.statistics_key()] {
        let sink = Rc::clone(&log);
        session
            .watch(key, move |v: &View| sink.borrow_mut().push(v.clone()))
            .unwrap();
    }

    session.save(input(USER, Category::Investment, "30")).unwrap();
    session.delete("f-1").unwrap();
    let mut raise = TransactionInput::from(session.transaction("f-2").unwrap());
    raise.amount = dec("120");
    session.save(raise).unwrap();

    // Replay the notifications in order: whenever both keys show settled
    // data, the totals must match the list they sit next to.
    let mut latest: HashMap<QueryKind, View> = HashMap::new();
    let mut settled_pairs = 0;
    for view in log.borrow().iter() {
        latest.insert(view.key.kind, view.clone());
        let (Some(list), Some(stats)) = (
            latest.get(&QueryKind::TransactionList),
            latest.get(&QueryKind::CategoryStatistics),
        ) else {
            continue;
        };
        if list.is_ready() && stats.is_ready() {
            settled_pairs += 1;
            assert_eq!(
                stats.statistics().unwrap(),
                aggregate(list.transactions().unwrap()).as_slice()
            );
        }
    }
    assert!(settled_pairs >= 4);
}

#[test]
fn totals_match_the_ledger_after_every_mutation() {
    let mut session = Session::new(FakeGateway::new(), user());
    let list = session.transactions_key();

    let check = |session: &mut Session<FakeGateway>| {
        let mut expected: HashMap<Category, Decimal> = HashMap::new();
        for t in session.gateway().rows(USER) {
            *expected.entry(t.category).or_default() += t.amount;
        }
        let got = statistics_of(session);
        assert_eq!(got.len(), expected.len());
        for s in &got {
            assert_eq!(Some(&s.total_amount), expected.get(&s.category));
        }
    };

    let a = session.save(input(USER, Category::Expense, "10")).unwrap();
    check(&mut session);
    let b = session.save(input(USER, Category::Saving, "20.5")).unwrap();
    check(&mut session);
    let c = session.save(input(USER, Category::Expense, "0.1")).unwrap();
    check(&mut session);

    session.load(&list).unwrap();
    let mut moved = TransactionInput::from(&a);
    moved.category = Category::Investment;
    session.save(moved).unwrap();
    check(&mut session);

    let mut note = TransactionInput::from(&b);
    note.description = "rainy day".into();
    session.save(note).unwrap();
    check(&mut session);

    session.delete(&c.id).unwrap();
    check(&mut session);
    session.save(input(USER, Category::Other, "7")).unwrap();
    check(&mut session);
    session.delete(&a.id).unwrap();
    check(&mut session);
    session.delete(&b.id).unwrap();
    check(&mut session);
}

#[test]
fn invalid_input_never_reaches_the_gateway() {
    let mut session = seeded(FakeGateway::new());
    let err = session
        .save(input(USER, Category::Expense, "-5"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut blank = input(USER, Category::Expense, "5");
    blank.description = "  ".into();
    assert!(matches!(session.save(blank), Err(Error::Validation(_))));
    assert_eq!(session.gateway().save_calls.get(), 0);
}

#[test]
fn zero_amount_is_allowed() {
    let mut session = seeded(FakeGateway::new());
    let saved = session.save(input(USER, Category::Other, "0")).unwrap();
    assert_eq!(saved.amount, Decimal::ZERO);
}

#[test]
fn server_rejection_changes_nothing() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    session.load(&key).unwrap();

    session
        .gateway()
        .fail_next(Error::Validation("amount rejected".into()));
    let err = session
        .save(input(USER, Category::Expense, "5"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(session.cache().freshness(&key), Freshness::Fresh);
}

#[test]
fn deleting_a_missing_record_marks_views_stale() {
    let mut session = seeded(FakeGateway::new());
    let key = session.transactions_key();
    session.load(&key).unwrap();

    let err = session.delete("nope").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let view = session.read(&key);
    assert_eq!(view.phase, Phase::Ready);
    assert!(view.stale);
    assert_eq!(view.transactions().unwrap().len(), 2);

    // The next read re-syncs.
    let view = session.load(&key).unwrap();
    assert!(view.is_ready());
}

#[test]
fn network_failure_during_mutation_marks_views_stale() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    session.load(&key).unwrap();

    session
        .gateway()
        .fail_next(Error::Network("connection reset".into()));
    let err = session
        .save(input(USER, Category::Expense, "5"))
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(session.cache().freshness(&key), Freshness::Stale);
    assert_eq!(session.gateway().rows(USER).len(), 2);
}

#[test]
fn failed_refresh_keeps_last_known_good() {
    let mut session = seeded(FakeGateway::new());
    let key = session.transactions_key();
    session.load(&key).unwrap();

    session
        .gateway()
        .fail_next(Error::Network("timed out".into()));
    let err = session.refresh(&key).unwrap_err();
    assert_eq!(err, Error::Network("timed out".into()));

    let view = session.read(&key);
    assert_eq!(view.phase, Phase::Error);
    assert_eq!(view.error, Some(Error::Network("timed out".into())));
    assert!(view.stale);
    assert_eq!(view.transactions().unwrap().len(), 2);
}

#[test]
fn failed_server_statistics_do_not_fall_back() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    session
        .gateway()
        .fail_next(Error::Network("bad gateway".into()));
    assert!(session.load(&key).is_err());
    assert_eq!(session.gateway().list_calls.get(), 0);
    assert_eq!(session.read(&key).phase, Phase::Error);
}

#[test]
fn mutation_succeeds_even_if_refetch_fails() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    session.load(&key).unwrap();

    session
        .gateway()
        .fail_next_read(Error::Network("flaky".into()));
    session.delete("f-1").unwrap();
    assert_eq!(session.gateway().rows(USER).len(), 1);

    let list = session.read(&session.transactions_key());
    assert_eq!(list.phase, Phase::Error);
    assert!(session.read(&key).is_ready());
}

#[test]
fn unsubscribed_callbacks_stay_quiet() {
    let mut session = seeded(FakeGateway::new());
    let (seen, cb) = recorder();
    let key = session.transactions_key();
    let id = session.watch(key, cb).unwrap();
    assert_eq!(session.subscription_count(), 1);
    let before = seen.borrow().len();

    assert!(session.unsubscribe(id));
    assert!(!session.unsubscribe(id));
    assert_eq!(session.subscription_count(), 0);

    session.save(input(USER, Category::Other, "3")).unwrap();
    assert_eq!(seen.borrow().len(), before);
}

#[test]
fn sync_reissues_stale_subscriptions_only() {
    let mut session = seeded(FakeGateway::new());
    let (_seen, cb) = recorder();
    let key = session.transactions_key();
    session.watch(key.clone(), cb).unwrap();
    assert_eq!(session.gateway().list_calls.get(), 1);

    session.sync().unwrap();
    assert_eq!(session.gateway().list_calls.get(), 1);

    session.gateway().seed(USER, Category::Other, "2");
    assert!(session.delete("x").is_err());
    session.sync().unwrap();
    assert_eq!(session.read(&key).transactions().unwrap().len(), 3);
    assert!(session.read(&key).is_ready());
}

#[test]
fn chart_is_rebuilt_only_when_totals_change() {
    let mut session = seeded(FakeGateway::new());
    let key = session.statistics_key();
    assert!(session.chart(&key).is_none());

    session.load(&key).unwrap();
    let labels = session.chart(&key).unwrap().labels.clone();
    assert_eq!(labels, vec!["expense", "saving"]);
    session.chart(&key).unwrap();
    assert_eq!(session.chart_computations(&key), 1);

    session.save(input(USER, Category::Investment, "5")).unwrap();
    let labels = session.chart(&key).unwrap().labels.clone();
    assert_eq!(labels, vec!["expense", "saving", "investment"]);
    assert_eq!(session.chart_computations(&key), 2);
}

#[test]
fn reset_returns_subscribers_to_loading() {
    let mut session = seeded(FakeGateway::new());
    let (seen, cb) = recorder();
    let key = session.statistics_key();
    session.watch(key.clone(), cb).unwrap();
    let pending = session.begin_fetch(&key, None);

    session.reset();
    let last = seen.borrow().last().cloned().unwrap();
    assert_eq!(last.phase, Phase::Loading);
    assert!(last.data.is_none());
    assert!(session.transaction("f-1").is_none());
    assert_eq!(session.subscription_count(), 1);

    let outcome = session.fetch(&key);
    let err = session.complete_fetch(pending, outcome).unwrap_err();
    assert!(matches!(err, Error::State(_)));
    assert_eq!(session.cache().freshness(&key), Freshness::Absent);
}
