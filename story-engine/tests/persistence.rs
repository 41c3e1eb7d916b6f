//! 快照与恢复：缓存替换、断点续揭示、展示状态还原、损坏与版本错误。

mod common;

use common::{detective_story, ms, new_session, settle};
use story_engine::{
    ChooseOutcome, EngineError, MemoryStore, Mode, PersistError, Projection, SessionSnapshot,
    SessionStatus, SnapshotStore,
};

/// 只比较与播放位置相关的字段（时间戳不参与）
fn assert_same_position(restored: &Projection, original: &Projection) {
    let texts = |p: &Projection| -> Vec<(String, String)> {
        p.visible_paragraphs
            .iter()
            .map(|v| (v.text.clone(), format!("{:?}", v.variant)))
            .collect()
    };
    assert_eq!(texts(restored), texts(original));
    assert_eq!(restored.mood, original.mood);
    assert_eq!(restored.chapter, original.chapter);
    assert_eq!(restored.title, original.title);
    assert_eq!(restored.mode, original.mode);
    assert_eq!(restored.scene_image, original.scene_image);
    assert_eq!(restored.interrogation, original.interrogation);
}

#[test]
fn test_restore_after_reveal_uses_cache() {
    let mut original = new_session(detective_story());
    original.start().unwrap();
    original.skip();
    original.choose(0).unwrap();
    settle(&mut original);

    let snapshot = original.snapshot().unwrap();
    assert_eq!(snapshot.materialized_paragraphs.len(), 2);

    let mut restored = new_session(detective_story());
    restored.resume(&snapshot).unwrap();

    let view = restored.projection();
    assert_same_position(&view, &original.projection());
    assert_eq!(view.mode, Mode::Interrogation);
    assert!(view.skipped);
    assert_eq!(restored.status(), SessionStatus::AwaitingChoice);

    // 缓存段落不重新触发效果，故事级标签也不重放
    assert!(restored.drain_effects().is_empty());
    assert!(!restored.is_dirty());

    // 选项来自运行时，可以继续玩
    assert_eq!(restored.choose(0).unwrap(), ChooseOutcome::Advanced);
    settle(&mut restored);
    assert_eq!(restored.status(), SessionStatus::AwaitingTap);
    assert_eq!(restored.projection().mode, Mode::Normal);
}

#[test]
fn test_restore_right_after_frame_transition() {
    let mut original = new_session(detective_story());
    original.start().unwrap();
    original.skip();
    original.choose(0).unwrap();
    original.drain_effects();

    // 新帧还没有揭示任何段落，整帧都在未展示部分
    let snapshot = original.snapshot().unwrap();
    assert!(snapshot.materialized_paragraphs.is_empty());
    assert_eq!(snapshot.pending_paragraphs.len(), 2);

    let mut restored = new_session(detective_story());
    restored.resume(&snapshot).unwrap();
    assert_same_position(&restored.projection(), &original.projection());
    assert_eq!(restored.projection().title, "Туман");
    assert_eq!(restored.status(), SessionStatus::Revealing);

    // 两边揭示完后位置一致，本帧的标签都已生效
    settle(&mut original);
    settle(&mut restored);
    let view = restored.projection();
    assert_same_position(&view, &original.projection());
    assert_eq!(view.mode, Mode::Interrogation);
    assert_eq!(view.visible_paragraphs.len(), 2);
    assert_eq!(view.interrogation.as_ref().map(|i| i.pressure), Some(30));
    assert_eq!(restored.status(), SessionStatus::AwaitingChoice);
    assert_eq!(restored.drain_effects(), original.drain_effects());
}

#[test]
fn test_restore_mid_reveal_continues_from_breakpoint() {
    let mut original = new_session(detective_story());
    original.start().unwrap();
    original.skip();
    original.choose(0).unwrap();
    original.tick(ms(300));
    assert_eq!(original.cursor().displayed_count, 1);
    original.drain_effects();

    let snapshot = original.snapshot().unwrap();
    assert_eq!(snapshot.materialized_paragraphs.len(), 1);
    assert_eq!(snapshot.pending_paragraphs.len(), 1);

    let mut restored = new_session(detective_story());
    restored.resume(&snapshot).unwrap();
    let view = restored.projection();
    assert_eq!(view.visible_paragraphs.len(), 1);
    assert_eq!(view.mode, Mode::Interrogation);
    assert_eq!(view.interrogation.as_ref().map(|i| i.pressure), Some(0));
    assert_eq!(restored.status(), SessionStatus::Revealing);
    // 已展示段落的效果不会重放
    assert!(restored.drain_effects().is_empty());

    settle(&mut original);
    settle(&mut restored);
    let view = restored.projection();
    assert_same_position(&view, &original.projection());
    assert_eq!(view.visible_paragraphs.len(), 2);
    assert_eq!(view.interrogation.as_ref().map(|i| i.pressure), Some(30));
    assert_eq!(restored.status(), SessionStatus::AwaitingChoice);
    assert_eq!(restored.drain_effects(), original.drain_effects());
}

#[test]
fn test_live_paragraphs_win_over_cache() {
    let mut original = new_session(detective_story());
    original.start().unwrap();
    original.skip();
    original.choose(0).unwrap();
    original.skip();
    original.choose(1).unwrap();
    original.skip();
    assert_eq!(original.status(), SessionStatus::AwaitingTap);

    let snapshot = original.snapshot().unwrap();

    // 运行时在读档后直接给出下一节点的段落
    let mut restored = new_session(detective_story());
    restored.resume(&snapshot).unwrap();
    assert_eq!(restored.status(), SessionStatus::Revealing);
    assert!(restored.projection().visible_paragraphs.is_empty());

    settle(&mut restored);
    let view = restored.projection();
    assert_eq!(view.visible_paragraphs[0].text, "Дело закрыто.");
    assert_eq!(view.chapter, 2);
    assert_eq!(restored.status(), SessionStatus::Ended);
}

#[test]
fn test_corrupt_runtime_state_is_typed_error() {
    let mut snapshot = SessionSnapshot::new("node=nowhere;visits=1", Vec::new());

    let mut session = new_session(detective_story());
    let err = session.resume(&snapshot).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Persist(PersistError::CorruptRuntimeState(_))
    ));
    assert!(matches!(session.status(), SessionStatus::Failed { .. }));

    snapshot.runtime_state = "garbage".to_string();
    let mut session = new_session(detective_story());
    assert!(session.resume(&snapshot).is_err());
    assert!(session.runtime().calls.is_empty());
}

#[test]
fn test_incompatible_version_is_rejected() {
    let mut original = new_session(detective_story());
    original.start().unwrap();
    let mut snapshot = original.snapshot().unwrap();
    snapshot.version.major += 1;

    let mut session = new_session(detective_story());
    assert!(matches!(
        session.resume(&snapshot),
        Err(EngineError::Persist(PersistError::IncompatibleVersion { .. }))
    ));
}

#[test]
fn test_persist_if_needed_tracks_transitions() {
    let mut store = MemoryStore::new();
    let mut session = new_session(detective_story());
    session.start().unwrap();

    // 帧切换后需要保存
    assert!(session.persist_if_needed(&mut store, "auto").unwrap());
    assert!(!session.persist_if_needed(&mut store, "auto").unwrap());
    let saved = store.get("auto").unwrap().unwrap();
    assert!(saved.materialized_paragraphs.is_empty());
    assert_eq!(saved.pending_paragraphs.len(), 2);

    // 揭示完成后再次需要保存，此时缓存包含全部段落
    settle(&mut session);
    assert!(session.is_dirty());
    assert!(session.persist_if_needed(&mut store, "auto").unwrap());
    let saved = store.get("auto").unwrap().unwrap();
    assert_eq!(saved.materialized_paragraphs.len(), 2);

    let mut restored = new_session(detective_story());
    restored.resume(&saved).unwrap();
    assert_eq!(restored.projection().visible_paragraphs.len(), 2);
    assert_eq!(restored.status(), SessionStatus::AwaitingChoice);
}

#[test]
fn test_closed_session_does_not_persist() {
    let mut store = MemoryStore::new();
    let mut session = new_session(detective_story());
    session.start().unwrap();
    session.close();

    assert!(!session.persist_if_needed(&mut store, "auto").unwrap());
    assert!(store.keys().is_empty());
}
