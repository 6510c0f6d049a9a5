//! Login and session behaviour against scripted loopback servers.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use rusty_bot_client::codec::chat::ChatTarget;
use rusty_bot_client::wotlk::opcode::Opcode;
use rusty_bot_client::{
    ClientError, RetryPolicy, SessionEvent, authenticate, authenticate_with_retry, connect_world,
};
use support::{ECHO_GUID, ECHO_NAME, RealmScript, bind_world, spawn_realm, spawn_world};
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next_chat(events: &mut broadcast::Receiver<SessionEvent>) -> (u64, String, String) {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for chat")
            .expect("event channel closed");
        if let SessionEvent::Chat(message) = event {
            return (message.sender_guid, message.sender, message.text);
        }
    }
}

#[tokio::test]
async fn split_logon_challenge_still_yields_the_realm_list() {
    let (_world, world_port) = bind_world().await;
    let realm = spawn_realm(
        RealmScript::Login {
            split_challenge: true,
        },
        world_port,
    )
    .await;

    let result = authenticate(&realm.config).await.unwrap();
    assert_eq!(result.realm.name, "Mock");
    assert_eq!(result.realm.address(), format!("127.0.0.1:{world_port}"));
    assert_eq!(result.session_key.len(), 40);
}

#[tokio::test]
async fn rejected_logon_challenge_reports_the_status() {
    let realm = spawn_realm(RealmScript::RejectChallenge(0x04), 0).await;
    let err = authenticate(&realm.config).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthChallengeFailed(0x04)), "{err}");
}

#[tokio::test]
async fn reconnect_required_is_retried_up_to_the_attempt_limit() {
    let realm = spawn_realm(RealmScript::DemandReconnect, 0).await;
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
    };
    let err = authenticate_with_retry(&realm.config, &policy)
        .await
        .unwrap_err();
    assert!(err.is_reconnect_required());
    assert_eq!(realm.connections.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn other_auth_failures_are_not_retried() {
    let realm = spawn_realm(RealmScript::RejectChallenge(0x03), 0).await;
    let err = authenticate_with_retry(&realm.config, &RetryPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AuthChallengeFailed(0x03)));
    assert_eq!(realm.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_login_stays_open_until_closed() {
    let (world_listener, world_port) = bind_world().await;
    let realm = spawn_realm(
        RealmScript::Login {
            split_challenge: false,
        },
        world_port,
    )
    .await;
    let auth = authenticate(&realm.config).await.unwrap();
    let world = spawn_world(world_listener, auth.session_key);

    let handle = connect_world(realm.config.clone(), auth).await.unwrap();
    assert!(timeout(Duration::from_millis(100), handle.closed()).await.is_err());
    assert!(!handle.is_closed());

    handle.close().await;
    assert!(handle.is_closed());
    timeout(WAIT, handle.closed()).await.unwrap();

    let log = timeout(WAIT, world).await.unwrap().unwrap().unwrap();
    assert!(log.contains(&Opcode::CMSG_CONTACT_LIST));
    assert!(matches!(
        handle.say("too late").await,
        Err(ClientError::SessionClosed)
    ));
}

#[tokio::test]
async fn chat_echo_resolves_the_sender_with_one_name_query() {
    let (world_listener, world_port) = bind_world().await;
    let realm = spawn_realm(
        RealmScript::Login {
            split_challenge: false,
        },
        world_port,
    )
    .await;
    let auth = authenticate(&realm.config).await.unwrap();
    let world = spawn_world(world_listener, auth.session_key);
    let handle = connect_world(realm.config.clone(), auth).await.unwrap();
    let mut events = handle.subscribe();

    handle.say("hello").await.unwrap();
    assert_eq!(
        next_chat(&mut events).await,
        (ECHO_GUID, ECHO_NAME.to_string(), "hello".to_string())
    );

    handle.send_sticky("again").await.unwrap();
    assert_eq!(
        next_chat(&mut events).await,
        (ECHO_GUID, ECHO_NAME.to_string(), "again".to_string())
    );

    handle.close().await;
    let log = timeout(WAIT, world).await.unwrap().unwrap().unwrap();
    let name_queries = log
        .iter()
        .filter(|&&opcode| opcode == Opcode::CMSG_NAME_QUERY)
        .count();
    assert_eq!(name_queries, 1);
    assert_eq!(
        log.iter()
            .filter(|&&opcode| opcode == Opcode::CMSG_MESSAGECHAT)
            .count(),
        2
    );
}

#[tokio::test]
async fn session_commands_validate_local_state() {
    let (world_listener, world_port) = bind_world().await;
    let realm = spawn_realm(
        RealmScript::Login {
            split_challenge: false,
        },
        world_port,
    )
    .await;
    let auth = authenticate(&realm.config).await.unwrap();
    let _world = spawn_world(world_listener, auth.session_key);
    let handle = connect_world(realm.config.clone(), auth).await.unwrap();

    assert!(matches!(
        handle.send_sticky("nothing yet").await,
        Err(ClientError::NoStickyChatMode)
    ));
    assert!(matches!(
        handle.send_chat(ChatTarget::Channel(4), "hi").await,
        Err(ClientError::UnknownChannel(4))
    ));
    assert!(matches!(
        handle.set_leader("Nobody").await,
        Err(ClientError::UnknownPartyMember(_))
    ));
    assert!(matches!(
        handle.remove_friend("Nobody").await,
        Err(ClientError::UnknownFriend(_))
    ));
    assert_eq!(handle.channel_name(1).await.unwrap(), None);
    assert!(handle.friends().await.unwrap().is_empty());
    assert!(handle.nearby_entities().await.unwrap().is_empty());
    handle.close().await;
}
