use std::rc::Rc;

use async_trait::async_trait;

use crate::bridge::{HistoryRecord, SystemApi};
use crate::config::{MarkerAttributes, TemplateSpec};
use crate::context::ShellContext;
use crate::dom::{ShellDom, attribute_selector};
use crate::error::ShellError;
use crate::router::{Page, PageDescriptor};
use crate::template::{RenderContext, TemplateCache};

pub const MODULE: &str = "pages::history";
pub const URL: &str = "/pages/history.html";

const FAVORITE_ACTION: &str = "actions.fav";
const FAVORITE_CLASS: &str = "btn-danger";
const NOT_FAVORITE_CLASS: &str = "btn-primary";

/// History table with a favorite toggle per row.
pub struct HistoryPage<D: ShellDom> {
    api: SystemApi,
    templates: Rc<TemplateCache<D>>,
    row_template: TemplateSpec,
    rows_selector: String,
}

pub fn setup<D: ShellDom + 'static>(
    context: &ShellContext<D>,
    api: &SystemApi,
) -> Result<PageDescriptor, ShellError> {
    let toggler = FavoriteToggle {
        dom: context.dom.clone(),
        api: api.clone(),
        markers: context.config.markers.clone(),
    };
    let toggler = Rc::new(toggler);
    context
        .registry
        .register(FAVORITE_ACTION, move |argument: String| {
            let toggler = toggler.clone();
            async move { toggler.toggle(&argument).await.map(drop) }
        })?;

    Ok(Rc::new(HistoryPage {
        api: api.clone(),
        templates: context.templates.clone(),
        row_template: context.config.history_row_template.clone(),
        rows_selector: context.config.selectors.history_rows.clone(),
    }))
}

/// Row placeholders: `id`, `favorite`, `description`, `favorable` and
/// `favorable_btn`.
#[must_use]
pub fn row_context(record: &HistoryRecord) -> RenderContext {
    RenderContext::new()
        .with("id", record.id.as_str())
        .with("favorite", if record.is_favorite { "highlight" } else { "" })
        .with("description", record.description.as_str())
        .with("favorable", u8::from(record.is_favorite))
        .with("favorable_btn", button_class(record.is_favorite))
}

fn button_class(is_favorite: bool) -> &'static str {
    if is_favorite {
        FAVORITE_CLASS
    } else {
        NOT_FAVORITE_CLASS
    }
}

#[async_trait(?Send)]
impl<D: ShellDom + 'static> Page for HistoryPage<D> {
    fn url(&self) -> &str {
        URL
    }

    async fn post_init(&self) -> Result<(), ShellError> {
        let rows = self
            .templates
            .get_or_fetch(
                &self.row_template.name,
                &self.row_template.url,
                self.row_template.minimum_load_budget,
            )
            .await?;
        let records = self.api.list_records().await?;
        let items = records.iter().map(row_context).collect::<Vec<_>>();
        let appended = rows.batch_append(&self.rows_selector, &items)?;
        tracing::debug!(rows = appended, "history rows rendered");
        Ok(())
    }
}

struct FavoriteToggle<D: ShellDom> {
    dom: Rc<D>,
    api: SystemApi,
    markers: MarkerAttributes,
}

impl<D: ShellDom> FavoriteToggle<D> {
    /// `argument` is `<id>/<favorable>`; a favorable of 0 or anything that is
    /// not an integer counts as "not a favorite yet". Returns the new status.
    async fn toggle(&self, argument: &str) -> Result<bool, ShellError> {
        let (id, status) = argument.split_once('/').unwrap_or((argument, ""));
        let was_favorite = status.trim().parse::<i64>().is_ok_and(|value| value != 0);

        if was_favorite {
            self.api.unmark_favorite(id).await?;
        } else {
            self.api.mark_favorite(id).await?;
        }
        let is_favorite = !was_favorite;
        tracing::info!(id, is_favorite, "favorite toggled");

        let button = attribute_selector(&self.markers.argument, &format!("{id}/btn"));
        if let Some(button) = self.dom.query(&button) {
            self.dom.remove_class(&button, button_class(was_favorite));
            self.dom.add_class(&button, button_class(is_favorite));
            self.dom.set_attribute(
                &button,
                &self.markers.action,
                &format!("{FAVORITE_ACTION}/{id}/{}", u8::from(is_favorite)),
            );
        }
        Ok(is_favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::methods;
    use crate::dom::memory::MemoryDom;
    use crate::testing::{FakeBridge, FakeFetcher, TestRuntime};

    const ROW: &str = r#"<tr class="{{favorite}}"><td>{{description}}</td><td><button class="btn {{favorable_btn}}" data-id="{{id}}/btn" data-action="actions.fav/{{id}}/{{favorable}}">*</button></td></tr>"#;

    fn toggle(dom: Rc<MemoryDom>, bridge: Rc<FakeBridge>) -> FavoriteToggle<MemoryDom> {
        FavoriteToggle {
            dom,
            api: SystemApi::new(bridge),
            markers: MarkerAttributes::default(),
        }
    }

    #[test]
    fn row_context_encodes_favorite_as_flags_and_classes() {
        let row = row_context(&HistoryRecord {
            id: "42".to_string(),
            is_favorite: true,
            description: "won".to_string(),
        });
        assert_eq!(row.display("favorite"), "highlight");
        assert_eq!(row.display("favorable"), "1");
        assert_eq!(row.display("favorable_btn"), "btn-danger");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn toggle_marks_then_unmarks_and_rewrites_marker() {
        let dom = Rc::new(MemoryDom::from_markup(
            r#"<button class="btn btn-primary" data-id="42/btn" data-action="actions.fav/42/0"></button>"#,
        ));
        let bridge = Rc::new(FakeBridge::default().with_records(&[("42", false, "spin")]));
        let toggle = toggle(dom.clone(), bridge.clone());
        let button = dom.query("[data-id=\"42/btn\"]").expect("button");

        assert!(toggle.toggle("42/0").await.expect("mark"));
        assert!(dom.has_class(&button, "btn-danger"));
        assert!(!dom.has_class(&button, "btn-primary"));
        assert_eq!(
            dom.attribute(&button, "data-action").as_deref(),
            Some("actions.fav/42/1")
        );
        assert!(bridge.records.borrow()[0].is_favorite);

        assert!(!toggle.toggle("42/1").await.expect("unmark"));
        assert!(dom.has_class(&button, "btn-primary"));
        assert!(!bridge.records.borrow()[0].is_favorite);
        assert_eq!(bridge.calls_to(methods::MARK_FAVORITE).len(), 1);
        assert_eq!(bridge.calls_to(methods::UNMARK_FAVORITE).len(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn ids_with_selector_characters_still_restyle_their_button() {
        let dom = Rc::new(MemoryDom::from_markup(
            r#"<button class="btn btn-primary" data-id="x&quot;]y/btn"></button>"#,
        ));
        let bridge = Rc::new(FakeBridge::default().with_records(&[("x\"]y", false, "")]));
        let toggle = toggle(dom.clone(), bridge.clone());

        assert!(toggle.toggle("x\"]y/0").await.expect("mark"));
        let button = dom.query("button").expect("button");
        assert!(dom.has_class(&button, "btn-danger"));
        assert_eq!(
            dom.attribute(&button, "data-action").as_deref(),
            Some("actions.fav/x\"]y/1")
        );
        assert!(bridge.records.borrow()[0].is_favorite);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unparsable_status_counts_as_not_favorite() {
        let dom = Rc::new(MemoryDom::new());
        let bridge = Rc::new(FakeBridge::default().with_records(&[("7", false, "")]));
        let toggle = toggle(dom, bridge.clone());

        assert!(toggle.toggle("7/false").await.expect("mark"));
        assert!(toggle.toggle("7").await.is_ok());
        assert_eq!(bridge.calls_to(methods::MARK_FAVORITE).len(), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn failed_host_call_leaves_button_untouched() {
        let dom = Rc::new(MemoryDom::from_markup(
            r#"<button class="btn btn-primary" data-id="42/btn"></button>"#,
        ));
        let bridge = Rc::new(FakeBridge::default());
        bridge.fail(methods::MARK_FAVORITE);
        let toggle = toggle(dom.clone(), bridge);

        let error = toggle.toggle("42/0").await.expect_err("rejected");
        assert_eq!(error.code(), "bridge_call_failed");
        let button = dom.query("[data-id=\"42/btn\"]").expect("button");
        assert!(dom.has_class(&button, "btn-primary"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn post_init_appends_one_row_per_record() {
        let dom = Rc::new(MemoryDom::from_markup(r#"<table><tbody id="hist"></tbody></table>"#));
        let fetcher = Rc::new(FakeFetcher::default().with("/template/table_data.html", ROW));
        let templates = Rc::new(TemplateCache::new(
            dom.clone(),
            Rc::new(TestRuntime::default()),
            fetcher,
        ));
        let bridge = Rc::new(
            FakeBridge::default().with_records(&[("1", true, "first"), ("2", false, "second")]),
        );
        let page = HistoryPage {
            api: SystemApi::new(bridge),
            templates,
            row_template: TemplateSpec::new("table_data", "/template/table_data.html", 10),
            rows_selector: "#hist".to_string(),
        };

        page.post_init().await.expect("rows");

        let hist = dom.query("#hist").expect("hist");
        let rows = dom.query_all_within(&hist, "tr");
        assert_eq!(rows.len(), 2);
        assert!(dom.has_class(&rows[0], "highlight"));
        let buttons = dom.query_all_within(&hist, "button");
        assert_eq!(
            dom.attribute(&buttons[1], "data-action").as_deref(),
            Some("actions.fav/2/0")
        );
        assert!(dom.has_class(&buttons[0], "btn-danger"));
    }
}
