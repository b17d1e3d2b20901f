//! Integration tests for the dbadiag MCP Server.
//!
//! These exercise the public API end to end: level resolution, the message
//! front-end, the in-memory logs and environment configuration.
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

use dbadiag_mcp_server::config::Config;
use dbadiag_mcp_server::log_store::{LogFilter, MessageType};
use dbadiag_mcp_server::message::MessageRoute;
use dbadiag_mcp_server::modifier::WildcardPattern;
use dbadiag_mcp_server::state::new_shared_state;
use dbadiag_mcp_server::{
    resolve_level, DiagnosticsMcpServer, LevelModifier, LevelRequest, LevelSettings,
    MessageLevel, MessageRequest, MessageWriter, NestingContext,
};
use serial_test::serial;

const FUNCTION: &str = "Copy-DbaAgentProxy";
const MODULE: &str = "dbatools";

fn settings(decrement: i64, modifiers: Vec<LevelModifier>) -> LevelSettings {
    let mut settings = LevelSettings::with_decrement(decrement);
    for rule in modifiers {
        settings.modifiers.insert(rule);
    }
    settings
}

fn level(value: u8) -> MessageLevel {
    MessageLevel::try_from(value).unwrap()
}

// =========================================================================
// Level resolution
// =========================================================================

#[test]
fn test_default_settings_are_identity() {
    let settings = LevelSettings::default();
    for original in MessageLevel::ALL {
        for depth in [0, 1, 5, 40] {
            let request = LevelRequest::new(original, FUNCTION, MODULE).depth(depth);
            assert_eq!(resolve_level(&settings, &request).unwrap(), original);
        }
    }
}

#[test]
fn test_single_matching_modifier() {
    let settings = settings(
        0,
        vec![LevelModifier::new("louder", -2)
            .include_function("Copy-*")
            .unwrap()],
    );
    let request = LevelRequest::new(MessageLevel::Verbose, FUNCTION, MODULE);
    assert_eq!(
        resolve_level(&settings, &request).unwrap(),
        MessageLevel::Significant
    );

    let other = LevelRequest::new(MessageLevel::Verbose, "Get-DbaDatabase", MODULE);
    assert_eq!(resolve_level(&settings, &other).unwrap(), MessageLevel::Verbose);
}

#[test]
fn test_modifiers_sum() {
    let settings = settings(
        0,
        vec![
            LevelModifier::new("minus-two", -2),
            LevelModifier::new("plus-one", 1),
        ],
    );
    let request = LevelRequest::new(MessageLevel::Verbose, FUNCTION, MODULE);
    let resolution = settings.explain(&request).unwrap();
    assert_eq!(resolution.level, MessageLevel::VeryVerbose);
    assert_eq!(resolution.modifier_total, -1);
    assert_eq!(resolution.applied_modifiers, vec!["minus-two", "plus-one"]);
}

#[test]
fn test_depth_decrement_clamps_high() {
    let settings = settings(2, vec![]);
    let request = LevelRequest::new(MessageLevel::InternalComment, FUNCTION, MODULE).depth(3);
    let resolution = settings.explain(&request).unwrap();
    assert_eq!(resolution.raw, 15);
    assert_eq!(resolution.level, MessageLevel::InternalComment);
}

#[test]
fn test_large_negative_modifier_clamps_low() {
    let settings = settings(0, vec![LevelModifier::new("shout", -5)]);
    let request = LevelRequest::new(MessageLevel::Critical, FUNCTION, MODULE);
    let resolution = settings.explain(&request).unwrap();
    assert_eq!(resolution.raw, -4);
    assert_eq!(resolution.level, MessageLevel::Critical);
}

#[test]
fn test_result_always_in_range() {
    for modifier in [-1000, -100, -9, -1, 0, 1, 9, 100, 1000, i64::MIN, i64::MAX] {
        let settings = settings(7, vec![LevelModifier::new("m", modifier)]);
        for original in MessageLevel::ALL {
            for depth in [-3, 0, 2, 1000] {
                let request = LevelRequest::new(original, FUNCTION, MODULE).depth(depth);
                let resolved = resolve_level(&settings, &request).unwrap().ordinal();
                assert!((1..=9).contains(&resolved));
            }
        }
    }
}

#[test]
fn test_clamp_applied_once_at_end() {
    // 9 + 5 - 10 = 4; clamping the intermediate 14 to 9 would give -1 -> 1.
    let settings = settings(
        0,
        vec![
            LevelModifier::new("a", 5),
            LevelModifier::new("b", -10),
        ],
    );
    let request = LevelRequest::new(MessageLevel::InternalComment, FUNCTION, MODULE);
    assert_eq!(
        resolve_level(&settings, &request).unwrap(),
        MessageLevel::VeryVerbose
    );
}

#[test]
fn test_modifier_order_independent() {
    let rules = vec![
        LevelModifier::new("a", 3),
        LevelModifier::new("b", -7),
        LevelModifier::new("c", 2).include_tags(["proxy"]),
        LevelModifier::new("d", i64::MAX),
        LevelModifier::new("e", i64::MIN),
    ];
    let permutations: [[usize; 5]; 4] = [
        [0, 1, 2, 3, 4],
        [4, 3, 2, 1, 0],
        [2, 4, 0, 3, 1],
        [3, 0, 4, 1, 2],
    ];
    let tags = vec!["proxy".to_string()];

    let mut results = Vec::new();
    for order in permutations {
        let settings = settings(1, order.iter().map(|&i| rules[i].clone()).collect());
        let request = LevelRequest::new(MessageLevel::Verbose, FUNCTION, MODULE)
            .tags(&tags)
            .depth(2);
        results.push(settings.explain(&request).unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_guarded_call_compensates_one_level() {
    let settings = settings(2, vec![]);
    for depth in 1..6 {
        let direct = LevelRequest::new(MessageLevel::Important, FUNCTION, MODULE).depth(depth);
        let guarded = LevelRequest::new(MessageLevel::Important, FUNCTION, MODULE)
            .depth(depth + 1)
            .guarded(true);
        assert_eq!(
            resolve_level(&settings, &direct).unwrap(),
            resolve_level(&settings, &guarded).unwrap()
        );
    }
}

#[test]
fn test_decrement_disabled_ignores_depth() {
    for decrement in [0, -1, -50] {
        let settings = settings(decrement, vec![]);
        let request = LevelRequest::new(MessageLevel::Significant, FUNCTION, MODULE).depth(12);
        let resolution = settings.explain(&request).unwrap();
        assert_eq!(resolution.level, MessageLevel::Significant);
        assert_eq!(resolution.effective_depth, None);
    }
}

#[test]
fn test_tag_criteria() {
    let settings = settings(
        0,
        vec![LevelModifier::new("quiet-proxy", 3)
            .include_tags(["proxy"])
            .exclude_tags(["security"])],
    );

    let proxy = vec!["Proxy".to_string()];
    let both = vec!["proxy".to_string(), "security".to_string()];

    let tagged = LevelRequest::new(level(2), FUNCTION, MODULE).tags(&proxy);
    let excluded = LevelRequest::new(level(2), FUNCTION, MODULE).tags(&both);
    let untagged = LevelRequest::new(level(2), FUNCTION, MODULE);

    assert_eq!(resolve_level(&settings, &tagged).unwrap(), level(5));
    assert_eq!(resolve_level(&settings, &excluded).unwrap(), level(2));
    assert_eq!(resolve_level(&settings, &untagged).unwrap(), level(2));
}

#[test]
fn test_empty_names_rejected() {
    let settings = LevelSettings::default();
    assert!(resolve_level(&settings, &LevelRequest::new(level(1), "", MODULE)).is_err());
    assert!(resolve_level(&settings, &LevelRequest::new(level(1), FUNCTION, " ")).is_err());
}

// =========================================================================
// Message front-end and logs
// =========================================================================

#[test]
fn test_nested_writes_end_to_end() {
    let state = new_shared_state(&Config::default());
    state.settings().set_nesting_decrement(1);
    state
        .settings()
        .register_modifier(LevelModifier::new("replication", -1).include_module("dbatools*").unwrap());

    let writer = MessageWriter::new(state.clone());
    {
        let _outer = writer.enter();
        writer
            .write(
                MessageRequest::new(MessageLevel::Significant, FUNCTION, MODULE, "outer")
                    .target("sql01"),
            )
            .unwrap();

        let _inner = writer.enter();
        let written = writer
            .write(
                MessageRequest::new(MessageLevel::Significant, "Get-DbaAgentProxy", MODULE, "inner")
                    .target("sql01"),
            )
            .unwrap();
        // 3 + 2 - 1
        assert_eq!(written.resolution.level, MessageLevel::VeryVerbose);
        assert_eq!(written.route, MessageRoute::Verbose);
    }
    assert_eq!(writer.context().depth(), 0);

    let filter = LogFilter {
        function_name: Some(WildcardPattern::new("get-*").unwrap()),
        ..LogFilter::default()
    };
    let entries = state.log().messages(&filter);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "inner");
    assert_eq!(entries[0].depth, 2);

    let by_target = LogFilter {
        target: Some("sql01".to_string()),
        ..LogFilter::default()
    };
    assert_eq!(state.log().messages(&by_target).len(), 2);
}

#[test]
fn test_settings_change_applies_to_next_write() {
    let state = new_shared_state(&Config::default());
    let writer = MessageWriter::new(state.clone());

    let before = writer
        .write(MessageRequest::new(MessageLevel::Verbose, FUNCTION, MODULE, "before"))
        .unwrap();
    state.settings().register_modifier(LevelModifier::new("promote", -4));
    let after = writer
        .write(MessageRequest::new(MessageLevel::Verbose, FUNCTION, MODULE, "after"))
        .unwrap();

    assert_eq!(before.route, MessageRoute::Verbose);
    assert_eq!(after.resolution.level, MessageLevel::Critical);
    assert_eq!(after.route, MessageRoute::Information);
}

#[test]
fn test_log_is_bounded() {
    let mut config = Config::default();
    config.log.max_message_count = 3;
    let state = new_shared_state(&config);
    let writer = MessageWriter::new(state.clone());

    for i in 0..5 {
        writer
            .write(MessageRequest::new(
                MessageLevel::Verbose,
                FUNCTION,
                MODULE,
                format!("message {i}"),
            ))
            .unwrap();
    }

    let entries = state.log().messages(&LogFilter::default());
    let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
    assert_eq!(state.metrics().snapshot().messages_evicted, 2);

    let last_two = LogFilter {
        last: Some(2),
        ..LogFilter::default()
    };
    let newest: Vec<_> = state
        .log()
        .messages(&last_two)
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(newest, vec!["message 3", "message 4"]);
}

#[test]
fn test_separate_contexts_have_separate_depth() {
    let state = new_shared_state(&Config::default());
    state.settings().set_nesting_decrement(1);

    let first = MessageWriter::new(state.clone());
    let second = MessageWriter::with_context(state.clone(), NestingContext::new());

    let _scope = first.enter();
    let a = first
        .write(MessageRequest::new(MessageLevel::Critical, FUNCTION, MODULE, "a"))
        .unwrap();
    let b = second
        .write(MessageRequest::new(MessageLevel::Critical, FUNCTION, MODULE, "b"))
        .unwrap();

    assert_eq!(a.resolution.level, MessageLevel::Important);
    assert_eq!(b.resolution.level, MessageLevel::Critical);
    assert_ne!(first.context().runspace(), second.context().runspace());
}

#[test]
fn test_warning_bypasses_resolution() {
    let state = new_shared_state(&Config::default());
    state.settings().register_modifier(LevelModifier::new("quiet", 8));
    let writer = MessageWriter::new(state.clone());

    writer
        .warn(FUNCTION, MODULE, "Proxy already exists", &[], Some("sql02"))
        .unwrap();

    let entries = state.log().messages(&LogFilter::default());
    assert_eq!(entries[0].message_type, MessageType::Warning);
    assert_eq!(entries[0].level, MessageLevel::Important);
}

#[tokio::test]
async fn test_concurrent_writers_share_settings() {
    let server = DiagnosticsMcpServer::new(Config::default());
    server.state().settings().set_nesting_decrement(1);

    let mut handles = Vec::new();
    for task in 0..8i64 {
        let state = server.state().clone();
        handles.push(tokio::spawn(async move {
            let writer = MessageWriter::new(state);
            let _scopes: Vec<_> = (0..task).map(|_| writer.enter()).collect();
            writer
                .write(MessageRequest::new(
                    MessageLevel::Critical,
                    FUNCTION,
                    MODULE,
                    format!("task {task}"),
                ))
                .map(|w| (task, w.resolution.level))
        }));
    }

    for handle in handles {
        let (task, resolved) = handle.await.unwrap().unwrap();
        assert_eq!(resolved, MessageLevel::clamped(1 + task));
    }
    assert_eq!(server.state().log().message_count(), 8);
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("DBADIAG_NESTING_DECREMENT", "3");
    std::env::set_var("DBADIAG_MAX_VERBOSE", "Debug");
    std::env::set_var("DBADIAG_MAX_MESSAGE_COUNT", "64");

    let config = Config::from_env();

    std::env::remove_var("DBADIAG_NESTING_DECREMENT");
    std::env::remove_var("DBADIAG_MAX_VERBOSE");
    std::env::remove_var("DBADIAG_MAX_MESSAGE_COUNT");

    let config = config.unwrap();
    assert_eq!(config.levels.nesting_decrement, 3);
    assert_eq!(config.routing.verbose.max, MessageLevel::Debug);
    assert_eq!(config.log.max_message_count, 64);
}

#[test]
#[serial]
fn test_server_from_env_rejects_bad_threshold() {
    std::env::set_var("DBADIAG_MIN_INFO", "loud");
    let result = DiagnosticsMcpServer::from_env();
    std::env::remove_var("DBADIAG_MIN_INFO");

    assert!(result.is_err());
}
