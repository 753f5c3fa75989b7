//! Dialogue state: who speaks, and the evaluated elements of what they say.

use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;
use vellum_serde::{Class, ClassRef, ObjectRef, Serializable, Value, construct, type_mismatch};

use crate::state::{DIRTY_FIELD, StateCore, StateObject, set_dirty_field};

/// Class of [`Actor`].
pub static ACTOR: Class = Class::new("Actor", construct::<Actor>);
/// Class of [`TextStyle`].
pub static TEXT_STYLE: Class = Class::new("MessageTextStyle", construct::<TextStyle>);
/// Class of [`MessageText`].
pub static MESSAGE_TEXT: Class = Class::new("MessageText", construct::<MessageText>);
/// Class of [`StageDirection`].
pub static STAGE_DIRECTION: Class = Class::new("StageDirection", construct::<StageDirection>);
/// Class of [`Message`].
pub static MESSAGE: Class = Class::new("Message", construct::<Message>);

fn string_value(class: ClassRef, key: &str, value: Value) -> Result<String, EngineError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(type_mismatch(class, key, "a string", &other)),
    }
}

fn optional_object(class: ClassRef, key: &str, value: Value) -> Result<Option<ObjectRef>, EngineError> {
    match value {
        Value::Object(object) => Ok(Some(object)),
        Value::Null | Value::Undefined => Ok(None),
        other => Err(type_mismatch(class, key, "an object or null", &other)),
    }
}

fn object_list(class: ClassRef, key: &str, value: &Value) -> Result<Vec<ObjectRef>, EngineError> {
    let Value::Array(array) = value else {
        return Err(type_mismatch(class, key, "an array of objects", value));
    };
    array
        .to_vec()
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(object),
            other => Err(type_mismatch(class, key, "an array of objects", &other)),
        })
        .collect()
}

/// A character that can speak. The renderer decides what a pose looks like.
#[derive(Debug, Default)]
pub struct Actor {
    state: StateCore,
    pose: Option<String>,
}

impl Actor {
    /// Creates an actor with no pose.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current pose.
    #[must_use]
    pub fn pose(&self) -> Option<&str> {
        self.pose.as_deref()
    }

    /// Changes the pose.
    pub fn set_pose(&mut self, pose: Option<String>) {
        self.pose = pose;
        self.state.mark_dirty();
    }
}

impl Serializable for Actor {
    fn class(&self) -> ClassRef {
        &ACTOR
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![("pose".to_owned(), Value::from(self.pose.clone()))];
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "pose" => {
                let pose = match value {
                    Value::Null | Value::Undefined => None,
                    other => Some(string_value(&ACTOR, key, other)?),
                };
                self.set_pose(pose);
            }
            DIRTY_FIELD => return set_dirty_field(&*self, &value),
            _ => self.state.set_extra(key, value),
        }
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for Actor {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

const STYLE_FIELDS: [&str; 7] = [
    "style",
    "variant",
    "weight",
    "stretch",
    "size",
    "lineHeight",
    "family",
];

/// Font settings shared between pieces of message text.
///
/// Treat an instance as immutable once text uses it, and share it rather
/// than creating copies; documents then store it once.
#[derive(Debug)]
pub struct TextStyle {
    state: StateCore,
    style: String,
    variant: String,
    weight: String,
    stretch: String,
    size: String,
    line_height: String,
    family: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            state: StateCore::new(),
            style: "normal".to_owned(),
            variant: "normal".to_owned(),
            weight: "normal".to_owned(),
            stretch: "normal".to_owned(),
            size: "medium".to_owned(),
            line_height: "normal".to_owned(),
            family: "serif".to_owned(),
        }
    }
}

impl TextStyle {
    /// Creates the default style: normal medium serif.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The CSS-style font shorthand, e.g. `normal normal bold normal 12px/1.5 serif`.
    #[must_use]
    pub fn font_string(&self) -> String {
        format!(
            "{} {} {} {} {}/{} {}",
            self.style,
            self.variant,
            self.weight,
            self.stretch,
            self.size,
            self.line_height,
            self.family
        )
    }

    /// Reads a style property by field name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "style" => &self.style,
            "variant" => &self.variant,
            "weight" => &self.weight,
            "stretch" => &self.stretch,
            "size" => &self.size,
            "lineHeight" => &self.line_height,
            "family" => &self.family,
            _ => return None,
        };
        Some(value)
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "style" => Some(&mut self.style),
            "variant" => Some(&mut self.variant),
            "weight" => Some(&mut self.weight),
            "stretch" => Some(&mut self.stretch),
            "size" => Some(&mut self.size),
            "lineHeight" => Some(&mut self.line_height),
            "family" => Some(&mut self.family),
            _ => None,
        }
    }
}

impl Serializable for TextStyle {
    fn class(&self) -> ClassRef {
        &TEXT_STYLE
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let mut fields: Vec<(String, Value)> = STYLE_FIELDS
            .iter()
            .filter_map(|key| self.get(key).map(|v| ((*key).to_owned(), Value::from(v))))
            .collect();
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        if key == DIRTY_FIELD {
            return set_dirty_field(&*self, &value);
        }
        if self.slot(key).is_none() {
            self.state.set_extra(key, value);
            return Ok(());
        }
        let text = string_value(&TEXT_STYLE, key, value)?;
        if let Some(slot) = self.slot(key) {
            *slot = text;
        }
        self.state.mark_dirty();
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for TextStyle {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

thread_local! {
    static DEFAULT_STYLE: ObjectRef = ObjectRef::new(TextStyle::new());
}

/// The style new [`MessageText`] uses, shared per thread.
#[must_use]
pub fn default_text_style() -> ObjectRef {
    DEFAULT_STYLE.with(ObjectRef::clone)
}

/// Styled text, possibly spanning lines. Whitespace is significant.
#[derive(Debug)]
pub struct MessageText {
    state: StateCore,
    text: String,
    // Not subscribed: styles are shared widely and would collect subscribers.
    style: ObjectRef,
}

impl Default for MessageText {
    fn default() -> Self {
        Self::new("", default_text_style())
    }
}

impl MessageText {
    /// Creates text in `style`.
    #[must_use]
    pub fn new(text: &str, style: ObjectRef) -> Self {
        Self {
            state: StateCore::new(),
            text: text.to_owned(),
            style,
        }
    }

    /// The text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text.
    pub fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        self.state.mark_dirty();
    }

    /// The style object.
    #[must_use]
    pub fn style(&self) -> &ObjectRef {
        &self.style
    }

    /// Replaces the style.
    pub fn set_style(&mut self, style: ObjectRef) {
        self.style = style;
        self.state.mark_dirty();
    }
}

impl Serializable for MessageText {
    fn class(&self) -> ClassRef {
        &MESSAGE_TEXT
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            ("text".to_owned(), Value::from(self.text.as_str())),
            ("style".to_owned(), Value::Object(self.style.clone())),
        ];
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "text" => {
                self.text = string_value(&MESSAGE_TEXT, key, value)?;
                self.state.mark_dirty();
            }
            "style" => match value {
                Value::Object(style) => self.set_style(style),
                other => return Err(type_mismatch(&MESSAGE_TEXT, key, "an object", &other)),
            },
            DIRTY_FIELD => return set_dirty_field(&*self, &value),
            _ => self.state.set_extra(key, value),
        }
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for MessageText {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

/// Text describing what would be seen rather than read, e.g. for screen
/// readers or as a placeholder for missing sprite work.
#[derive(Debug, Default)]
pub struct StageDirection {
    state: StateCore,
    text: String,
}

impl StageDirection {
    /// Creates a stage direction.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            state: StateCore::new(),
            text: text.to_owned(),
        }
    }

    /// The text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text.
    pub fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        self.state.mark_dirty();
    }
}

impl Serializable for StageDirection {
    fn class(&self) -> ClassRef {
        &STAGE_DIRECTION
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![("text".to_owned(), Value::from(self.text.as_str()))];
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "text" => {
                self.text = string_value(&STAGE_DIRECTION, key, value)?;
                self.state.mark_dirty();
            }
            DIRTY_FIELD => return set_dirty_field(&*self, &value),
            _ => self.state.set_extra(key, value),
        }
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for StageDirection {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

/// One line of dialogue or narration.
///
/// The speaker and every content element subscribe the message, so any
/// change to them marks the message dirty.
#[derive(Debug)]
pub struct Message {
    state: StateCore,
    speaker: Option<ObjectRef>,
    loudness: f64,
    content: Vec<ObjectRef>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            state: StateCore::new(),
            speaker: None,
            loudness: 1.0,
            content: Vec::new(),
        }
    }
}

impl Message {
    /// Creates an empty narration message at normal loudness.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The speaking actor, or `None` for narration.
    #[must_use]
    pub fn speaker(&self) -> Option<&ObjectRef> {
        self.speaker.as_ref()
    }

    /// Replaces the speaker, moving the subscription along.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if the previous speaker had
    /// lost its subscription.
    pub fn set_speaker(&mut self, speaker: Option<ObjectRef>) -> Result<Option<ObjectRef>, EngineError> {
        self.state.replace_subscribed(&mut self.speaker, speaker)
    }

    /// How loudly the line is delivered: 1 is normal speech, 2 shouting,
    /// 0.5 whispering, 0 thought.
    #[must_use]
    pub fn loudness(&self) -> f64 {
        self.loudness
    }

    /// Changes the loudness.
    pub fn set_loudness(&mut self, loudness: f64) {
        self.loudness = loudness;
        self.state.mark_dirty();
    }

    /// The message elements, in reading order.
    #[must_use]
    pub fn content(&self) -> &[ObjectRef] {
        &self.content
    }

    /// Replaces the content, moving subscriptions along.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if a previous element had lost
    /// its subscription.
    pub fn set_content(&mut self, content: Vec<ObjectRef>) -> Result<Vec<ObjectRef>, EngineError> {
        self.state.replace_subscribed(&mut self.content, content)
    }
}

impl Serializable for Message {
    fn class(&self) -> ClassRef {
        &MESSAGE
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let content = self.content.iter().cloned().map(Value::Object).collect();
        let mut fields = vec![
            ("speaker".to_owned(), Value::from(self.speaker.clone())),
            ("loudness".to_owned(), Value::Number(self.loudness)),
            ("content".to_owned(), Value::array(content)),
        ];
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "speaker" => {
                self.set_speaker(optional_object(&MESSAGE, key, value)?)?;
            }
            "loudness" => match value {
                Value::Number(loudness) => self.set_loudness(loudness),
                other => return Err(type_mismatch(&MESSAGE, key, "a number", &other)),
            },
            "content" => {
                self.set_content(object_list(&MESSAGE, key, &value)?)?;
            }
            DIRTY_FIELD => return set_dirty_field(&*self, &value),
            _ => self.state.set_extra(key, value),
        }
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for Message {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use vellum_serde::{Registry, deep_clone, encode};

    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        crate::register(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_font_string_uses_every_property() {
        // Arrange
        let mut style = TextStyle::new();
        style.set_field("weight", Value::from("bold")).unwrap();
        style.set_field("size", Value::from("12px")).unwrap();
        style.set_field("lineHeight", Value::from("1.5")).unwrap();

        // Act
        let font = style.font_string();

        // Assert
        assert_eq!(font, "normal normal bold normal 12px/1.5 serif");
    }

    #[test]
    fn test_typed_fields_reject_the_wrong_kind() {
        let mut message = Message::new();
        let mut style = TextStyle::new();

        assert!(matches!(
            message.set_field("loudness", Value::from("loud")),
            Err(EngineError::Type(_))
        ));
        assert!(matches!(
            message.set_field("content", Value::array(vec![Value::from(1)])),
            Err(EngineError::Type(_))
        ));
        assert!(matches!(
            style.set_field("family", Value::Null),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn test_speaker_changes_dirty_the_message() {
        // Arrange
        let actor = ObjectRef::new(Actor::new());
        let mut message = Message::new();
        message.set_speaker(Some(actor.clone())).unwrap();
        message.set_dirty(false).unwrap();

        // Act
        actor
            .downcast::<Actor>()
            .unwrap()
            .borrow_mut()
            .set_pose(Some("frown".into()));

        // Assert
        assert!(message.is_dirty());
    }

    #[test]
    fn test_replaced_speaker_no_longer_dirties_the_message() {
        // Arrange
        let old = ObjectRef::new(Actor::new());
        let mut message = Message::new();
        message.set_speaker(Some(old.clone())).unwrap();
        message.set_speaker(None).unwrap();
        message.set_dirty(false).unwrap();

        // Act
        old.downcast::<Actor>()
            .unwrap()
            .borrow_mut()
            .set_pose(Some("shrug".into()));

        // Assert
        assert!(!message.is_dirty());
        assert_eq!(old.dirty_flag().unwrap().subscriber_count(), 0);
    }

    #[test]
    fn test_content_elements_subscribe_the_message() {
        // Arrange
        let direction = ObjectRef::new(StageDirection::new("She turns away."));
        let mut message = Message::new();
        message.set_content(vec![direction.clone()]).unwrap();
        message.set_dirty(false).unwrap();

        // Act
        direction
            .downcast::<StageDirection>()
            .unwrap()
            .borrow_mut()
            .set_text("She walks away.");

        // Assert
        assert!(message.is_dirty());
    }

    #[test]
    fn test_message_round_trip_keeps_shared_style_and_extras() {
        // Arrange
        let registry = registry();
        let style = ObjectRef::new(TextStyle::new());
        let first = ObjectRef::new(MessageText::new("Hello", style.clone()));
        let second = ObjectRef::new(MessageText::new(" there.", style));
        let speaker = ObjectRef::new(Actor::new());
        speaker
            .borrow_mut()
            .set_field("mood", Value::from("cheerful"))
            .unwrap();
        let mut message = Message::new();
        message.set_speaker(Some(speaker)).unwrap();
        message.set_loudness(0.5);
        message.set_content(vec![first, second]).unwrap();

        // Act
        let decoded = deep_clone(&registry, &Value::object(message)).unwrap();

        // Assert
        let decoded = decoded.as_object().unwrap().downcast::<Message>().unwrap();
        let decoded = decoded.borrow();
        assert!((decoded.loudness() - 0.5).abs() < f64::EPSILON);
        let speaker = decoded.speaker().unwrap().downcast::<Actor>().unwrap();
        assert_eq!(
            speaker.borrow().state().extra("mood").and_then(Value::as_str),
            Some("cheerful")
        );
        let texts: Vec<_> = decoded
            .content()
            .iter()
            .map(|o| o.downcast::<MessageText>().unwrap())
            .collect();
        assert_eq!(texts[0].borrow().text(), "Hello");
        assert!(texts[0].borrow().style().ptr_eq(texts[1].borrow().style()));
        assert!(decoded.is_dirty());
    }

    #[test]
    fn test_extras_are_encoded_again() {
        // Arrange
        let registry = registry();
        let mut actor = Actor::new();
        actor.set_field("legacy_slot", Value::from(4)).unwrap();

        // Act
        let document = encode(&registry, &Value::object(actor)).unwrap();

        // Assert
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"": {"": "sActor", "pose": null, "legacy_slot": 4.0}})
        );
    }
}
