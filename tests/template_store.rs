mod common;

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use coverkit::store::{FileStore, KeyValueStore, MemoryStore};
use coverkit::{
    Editor, EditorConfig, ElementId, Error, Rect, ResourceCategory, TextRole, TextStyle, Viewport,
};

use common::{gradient_png, solid_png};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("coverkit-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn open(dir: &PathBuf) -> Editor {
    Editor::new(
        EditorConfig::default(),
        Viewport::new(800.0, 450.0),
        FileStore::open(dir).unwrap(),
    )
    .unwrap()
}

/// Memory store shared with the test, with a quota that can be changed later
#[derive(Clone, Default)]
struct SharedStore {
    inner: Rc<RefCell<MemoryStore>>,
    quota: Rc<RefCell<Option<usize>>>,
}

impl SharedStore {
    fn used(&self) -> usize {
        self.inner.borrow().used()
    }

    fn value_len(&self, key: &str) -> usize {
        self.inner.borrow().get(key).unwrap().map(|v| v.len()).unwrap_or(0)
    }

    fn set_quota(&self, quota: usize) {
        *self.quota.borrow_mut() = Some(quota);
    }
}

impl KeyValueStore for SharedStore {
    fn get(&self, key: &str) -> coverkit::Result<Option<String>> {
        self.inner.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> coverkit::Result<()> {
        if let Some(quota) = *self.quota.borrow() {
            let current = self.value_len(key) + key.len();
            let others = self.used().saturating_sub(current);
            let needed = key.len() + value.len();
            if others + needed > quota {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(others),
                });
            }
        }
        self.inner.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> coverkit::Result<()> {
        self.inner.borrow_mut().remove(key)
    }
}

#[tokio::test]
async fn saved_template_restores_in_a_new_session() {
    let dir = temp_dir("roundtrip");
    let (template_id, expected_icon_rect) = {
        let mut editor = open(&dir);
        let bg = editor
            .add_resource(ResourceCategory::Background, "sky", &gradient_png(64, 36))
            .unwrap();
        let star = editor
            .add_resource(ResourceCategory::Icon, "star", &solid_png(8, 8, [255, 200, 0, 255]))
            .unwrap();
        editor.set_background(Some(bg.id)).unwrap();
        editor.set_icon_count(3).unwrap();
        editor.set_icon(2, Some(star.id)).unwrap();
        let icon_rect = Rect::new(500.0, 300.0, 120.0, 90.0);
        editor.set_rect(ElementId::Icon(2), icon_rect).unwrap();
        let mut style = TextStyle::for_role(TextRole::Title);
        style.stroke_width = 3.0;
        editor.set_text(TextRole::Title, "Episode 12", style).unwrap();

        let t = editor.save_template("weekly").await.unwrap();
        assert!(t.preview.starts_with("data:image/jpeg;base64,"));
        (t.id, icon_rect)
    };

    let mut editor = open(&dir);
    assert_eq!(editor.templates().len(), 1);
    assert_eq!(editor.templates()[0].name, "weekly");
    let report = editor.load_template(template_id).await.unwrap();
    assert!(report.skipped.is_empty(), "skipped {:?}", report.skipped);

    assert_eq!(editor.layers().icon_count(), 3);
    assert!(editor.layers().element(ElementId::Icon(2)).is_some());
    assert!(editor.layers().element(ElementId::Icon(0)).is_none());
    assert_eq!(
        editor.geometry().get_rect(ElementId::Icon(2)),
        Some(expected_icon_rect)
    );
    let title = editor
        .layers()
        .element(ElementId::Text(TextRole::Title))
        .and_then(|e| e.text())
        .unwrap();
    assert_eq!(title.text, "Episode 12");
    assert_eq!(title.style.stroke_width, 3.0);

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn template_survives_missing_resources_partially() {
    let dir = temp_dir("partial");
    {
        let mut editor = open(&dir);
        let hero = editor
            .add_resource(ResourceCategory::Character, "hero", &solid_png(4, 8, [9, 9, 9, 255]))
            .unwrap();
        editor.set_character(Some(hero.id)).unwrap();
        editor
            .set_text(TextRole::Subtitle, "still here", TextStyle::for_role(TextRole::Subtitle))
            .unwrap();
        editor.save_template("partial").await.unwrap();
    }

    // same templates, empty resource library
    let other = temp_dir("partial-other");
    fs::create_dir_all(&other).unwrap();
    fs::copy(dir.join("templates.json"), other.join("templates.json")).unwrap();

    let mut editor = open(&other);
    let id = editor.templates()[0].id;
    let report = editor.load_template(id).await.unwrap();
    assert_eq!(report.skipped, vec![ElementId::Character]);
    assert!(report.restored.contains(&ElementId::Text(TextRole::Subtitle)));
    assert!(editor.layers().element(ElementId::Character).is_none());

    let _ = fs::remove_dir_all(&dir);
    let _ = fs::remove_dir_all(&other);
}

#[tokio::test]
async fn eleventh_template_evicts_the_oldest() {
    let mut editor = Editor::new(
        EditorConfig::default(),
        Viewport::new(800.0, 450.0),
        MemoryStore::new(),
    )
    .unwrap();
    editor
        .set_text(TextRole::Title, "t", TextStyle::for_role(TextRole::Title))
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..11 {
        ids.push(editor.save_template(&format!("t{i:02}")).await.unwrap().id);
    }
    let kept: Vec<u64> = editor.templates().iter().map(|t| t.id).collect();
    assert_eq!(kept, ids[1..].to_vec());
}

#[tokio::test]
async fn quota_pressure_evicts_oldest_templates() {
    let store = SharedStore::default();
    let mut editor = Editor::new(
        EditorConfig::default(),
        Viewport::new(800.0, 450.0),
        store.clone(),
    )
    .unwrap();
    let star = editor
        .add_resource(ResourceCategory::Icon, "star", &solid_png(8, 8, [255, 0, 0, 255]))
        .unwrap();
    editor.set_icon(0, Some(star.id)).unwrap();

    editor.save_template("t00").await.unwrap();
    let per_template = store.value_len("templates");
    // room for the resources plus roughly three templates
    store.set_quota(store.used() + per_template * 3);

    let mut ids = Vec::new();
    for i in 1..8 {
        ids.push(editor.save_template(&format!("t{i:02}")).await.unwrap().id);
    }
    let kept: Vec<u64> = editor.templates().iter().map(|t| t.id).collect();
    assert!(kept.len() >= 2 && kept.len() <= 4, "kept {}", kept.len());
    assert_eq!(kept.last(), ids.last());
    assert!(kept.windows(2).all(|w| w[0] < w[1]), "not oldest-first");

    // resources were never touched by eviction
    assert_eq!(editor.resources().list(ResourceCategory::Icon).len(), 1);
}

#[tokio::test]
async fn template_that_can_never_fit_is_reported() {
    let store = SharedStore::default();
    let mut editor = Editor::new(
        EditorConfig::default(),
        Viewport::new(800.0, 450.0),
        store.clone(),
    )
    .unwrap();
    store.set_quota(store.used() + 16);
    let err = editor.save_template("too big").await.unwrap_err();
    assert!(err.is_quota_exceeded());
    assert!(editor.templates().is_empty());
}

#[tokio::test]
async fn delete_and_validation() {
    let mut editor = Editor::new(
        EditorConfig::default(),
        Viewport::new(800.0, 450.0),
        MemoryStore::new(),
    )
    .unwrap();
    assert!(matches!(
        editor.save_template("   ").await,
        Err(Error::Validation(_))
    ));

    let a = editor.save_template("a").await.unwrap();
    let b = editor.save_template("b").await.unwrap();
    assert!(editor.delete_template(a.id).unwrap());
    assert!(!editor.delete_template(a.id).unwrap());
    assert_eq!(editor.templates().len(), 1);
    assert_eq!(editor.templates()[0].id, b.id);
    assert!(editor.load_template(a.id).await.is_err());
}
