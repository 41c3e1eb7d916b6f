//! # Projection 模块
//!
//! 宿主看到的只读视图。
//!
//! 每次调用 [`Session::projection`](crate::session::Session::projection) 都重新生成，
//! 不持有任何对会话内部的引用；宿主按需渲染即可。
//! 交互入口（点击继续、选择）仍在 `Session` 上。

use serde::Serialize;

use crate::classify::{self, RenderVariant};
use crate::clock::StoryClock;
use crate::frame::{Choice, Paragraph};
use crate::interrogation::{InterrogationState, TacticalHint};
use crate::presentation::{ImageLayout, Mode, Mood, PresentationState, SceneImage};
use crate::reveal::RevealCursor;
use crate::session::SessionStatus;
use crate::tag::{self, Tag};

/// 一个可见段落
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleParagraph {
    pub text: String,
    pub tags: Vec<Tag>,
    pub variant: RenderVariant,
    /// 揭示时的故事时间
    pub at: StoryClock,
}

/// 一个可选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceItem {
    /// 交给 `Session::choose` 的索引
    pub index: usize,
    pub text: String,
    /// `tactic:<x>` 标签的值
    pub tactic: Option<String>,
}

impl From<&Choice> for ChoiceItem {
    fn from(choice: &Choice) -> Self {
        Self {
            index: choice.index,
            text: choice.text.clone(),
            tactic: tag::value_of(&choice.tags, "tactic").map(str::to_string),
        }
    }
}

/// 选项的呈现方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChoiceView {
    /// 揭示未完成或没有选项
    Hidden,
    /// 普通选项
    Free { options: Vec<ChoiceItem> },
    /// 审讯中的战术选项
    Interrogation { options: Vec<ChoiceItem> },
}

impl ChoiceView {
    /// 所有可选项（隐藏时为空）
    pub fn options(&self) -> &[ChoiceItem] {
        match self {
            Self::Hidden => &[],
            Self::Free { options } | Self::Interrogation { options } => options,
        }
    }
}

/// 审讯面板
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterrogationView {
    pub subject_id: String,
    pub subject_name: String,
    pub pressure: u8,
    pub time_budget_seconds: u32,
    pub tactical_hint: TacticalHint,
    pub hint_text: &'static str,
}

impl From<&InterrogationState> for InterrogationView {
    fn from(state: &InterrogationState) -> Self {
        let hint = state.tactical_hint();
        Self {
            subject_id: state.subject_id.clone(),
            subject_name: state.subject_name.clone(),
            pressure: state.pressure(),
            time_budget_seconds: state.time_budget_seconds(),
            tactical_hint: hint,
            hint_text: hint.text(),
        }
    }
}

/// 只读视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub status: SessionStatus,
    pub visible_paragraphs: Vec<VisibleParagraph>,
    pub choices: ChoiceView,
    pub is_revealing: bool,
    /// 本帧是否被跳过（宿主据此省略入场动画）
    pub skipped: bool,
    pub mood: Mood,
    pub chapter: u32,
    pub title: String,
    pub scene_image: Option<SceneImage>,
    pub image_layout: ImageLayout,
    pub mode: Mode,
    pub interrogation: Option<InterrogationView>,
    pub tactical_hint: Option<TacticalHint>,
    pub vision_active: bool,
    pub clock: StoryClock,
}

/// 生成视图所需的会话片段
pub(crate) struct ProjectionSource<'a> {
    pub status: SessionStatus,
    pub paragraphs: &'a [Paragraph],
    pub stamps: &'a [StoryClock],
    pub choices: &'a [Choice],
    pub cursor: RevealCursor,
    pub presentation: &'a PresentationState,
    pub legacy_text_heuristics: bool,
}

impl Projection {
    pub(crate) fn capture(source: ProjectionSource<'_>) -> Self {
        let ProjectionSource {
            status,
            paragraphs,
            stamps,
            choices,
            cursor,
            presentation,
            legacy_text_heuristics,
        } = source;

        let visible_paragraphs = paragraphs
            .iter()
            .zip(stamps)
            .take(cursor.displayed_count)
            .map(|(p, at)| VisibleParagraph {
                text: p.text.clone(),
                tags: p.tags.clone(),
                variant: classify::classify(&p.text, &p.tags, legacy_text_heuristics),
                at: *at,
            })
            .collect();

        let interrogation = presentation.interrogation.as_ref().map(InterrogationView::from);

        let choices = if cursor.is_revealing || choices.is_empty() {
            ChoiceView::Hidden
        } else {
            let options = choices.iter().map(ChoiceItem::from).collect();
            if interrogation.is_some() && choices.iter().any(Choice::is_interrogation) {
                ChoiceView::Interrogation { options }
            } else {
                ChoiceView::Free { options }
            }
        };

        Self {
            status,
            visible_paragraphs,
            choices,
            is_revealing: cursor.is_revealing,
            skipped: cursor.skipped,
            mood: presentation.mood,
            chapter: presentation.chapter,
            title: presentation.title.clone(),
            scene_image: presentation.scene_image.clone(),
            image_layout: presentation.image_layout,
            mode: presentation.mode(),
            tactical_hint: interrogation.as_ref().map(|view| view.tactical_hint),
            interrogation,
            vision_active: presentation.vision_active(),
            clock: presentation.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source<'a>(
        paragraphs: &'a [Paragraph],
        stamps: &'a [StoryClock],
        choices: &'a [Choice],
        cursor: RevealCursor,
        presentation: &'a PresentationState,
    ) -> ProjectionSource<'a> {
        ProjectionSource {
            status: SessionStatus::Idle,
            paragraphs,
            stamps,
            choices,
            cursor,
            presentation,
            legacy_text_heuristics: false,
        }
    }

    #[test]
    fn test_only_displayed_paragraphs_are_visible() {
        let paragraphs = vec![
            Paragraph::with_tags("Кто здесь?", ["speaker:lena"]),
            Paragraph::new("Тишина."),
        ];
        let stamps = vec![StoryClock::new(600)];
        let cursor = RevealCursor {
            displayed_count: 1,
            is_revealing: true,
            skipped: false,
        };
        let presentation = PresentationState::default();
        let choices = vec![Choice::new(0, "Ждать")];

        let view = Projection::capture(source(&paragraphs, &stamps, &choices, cursor, &presentation));
        assert_eq!(view.visible_paragraphs.len(), 1);
        assert_eq!(
            view.visible_paragraphs[0].variant,
            RenderVariant::Dialogue {
                speaker: "lena".to_string()
            }
        );
        assert_eq!(view.visible_paragraphs[0].at.to_string(), "10:00");
        // 揭示中不展示选项
        assert_eq!(view.choices, ChoiceView::Hidden);
        assert!(view.is_revealing);
    }

    #[test]
    fn test_interrogation_choice_view() {
        let paragraphs = vec![Paragraph::new("Он молчит.")];
        let stamps = vec![StoryClock::new(0)];
        let cursor = RevealCursor {
            displayed_count: 1,
            is_revealing: false,
            skipped: true,
        };
        let choices = vec![
            Choice::new(0, "Показать фото").tagged(["tactic:evidence"]),
            Choice::new(1, "Уйти"),
        ];

        let mut presentation = PresentationState::default();
        let free = Projection::capture(source(&paragraphs, &stamps, &choices, cursor, &presentation));
        assert!(matches!(free.choices, ChoiceView::Free { .. }));
        assert_eq!(free.interrogation, None);
        assert_eq!(free.tactical_hint, None);

        presentation.interrogation = Some(InterrogationState::enter(&Tag::parse_all([
            "suspect:gromov",
            "timer:120",
        ])));
        let view = Projection::capture(source(&paragraphs, &stamps, &choices, cursor, &presentation));
        assert_eq!(view.mode, Mode::Interrogation);
        assert_eq!(view.tactical_hint, Some(TacticalHint::BuildRapport));
        let panel = view.interrogation.unwrap();
        assert_eq!(panel.subject_id, "gromov");
        assert_eq!(panel.time_budget_seconds, 120);
        match view.choices {
            ChoiceView::Interrogation { options } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[0].tactic.as_deref(), Some("evidence"));
                assert_eq!(options[1].tactic, None);
            }
            other => panic!("应为审讯选项: {:?}", other),
        }
    }

    #[test]
    fn test_untagged_choices_stay_free_in_interrogation() {
        let cursor = RevealCursor::default();
        let choices = vec![Choice::new(0, "Дальше")];
        let presentation = PresentationState {
            interrogation: Some(InterrogationState::enter(&[])),
            ..Default::default()
        };
        let view = Projection::capture(source(&[], &[], &choices, cursor, &presentation));
        assert_eq!(view.choices.options().len(), 1);
        assert!(matches!(view.choices, ChoiceView::Free { .. }));
    }
}
