/// Popup UI for Tab Organizer extension

use patternfly_yew::prelude::*;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement, KeyboardEvent};
use yew::platform::time::sleep;
use yew::prelude::*;

use crate::background::TabStats;
use crate::browser::ChromeBridge;
use crate::navigation::{NavKey, NavTarget, NavigationItem, ScrollOutcome};
use crate::search::FacetChoice;
use crate::session::{KeyEffect, PopupSession};
use crate::sorting::{SortRule, SortSpec};
use crate::timing::now_ms;
use crate::ui::components::{BookmarkGroupView, FacetChips, TabRow, ToastStack};

type Session = PopupSession<ChromeBridge>;

#[function_component(App)]
pub fn app() -> Html {
    let session = use_memo((), |_| PopupSession::new(ChromeBridge));
    let update = use_force_update();
    let search_input = use_node_ref();
    let sort_override = use_state(|| None::<SortSpec>);
    let show_stats = use_state(|| false);
    let scroll_retry = use_state(|| 0u32);

    // Load tabs and config on mount
    {
        let session = session.clone();
        let update = update.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                session.refresh().await;
                update.force_update();
            });
            || ()
        });
    }

    // Keyboard navigation, document wide
    {
        let session = session.clone();
        let update = update.clone();
        let search_input = search_input.clone();
        use_effect_with((), move |_| {
            let listener = Closure::<dyn Fn(KeyboardEvent)>::new(move |e: KeyboardEvent| {
                let input_focused = e
                    .target()
                    .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
                    .is_some();
                let Some(key) = NavKey::from_key(&e.key(), input_focused) else {
                    return;
                };
                e.prevent_default();

                let session = session.clone();
                let update = update.clone();
                let search_input = search_input.clone();
                spawn_local(async move {
                    match session.handle_key(key).await {
                        KeyEffect::Activated(_) => session.browser().close_popup(),
                        KeyEffect::FocusSearch => {
                            if let Some(input) = search_input.cast::<HtmlInputElement>() {
                                let _ = input.focus();
                            }
                        }
                        _ => {}
                    }
                    update.force_update();
                });
            });

            let document = web_sys::window().and_then(|w| w.document());
            if let Some(document) = &document {
                let _ = document.add_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
            }
            move || {
                if let Some(document) = document {
                    let _ = document
                        .remove_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
                }
            }
        });
    }

    // Keep the selected row visible
    {
        let session = session.clone();
        let scroll_retry = scroll_retry.clone();
        use_effect_with((session.cursor(), *scroll_retry), move |_| {
            if session.scroll_active_into_view(scroll_to_row) == ScrollOutcome::ExpandedThenScrolled {
                scroll_retry.set(*scroll_retry + 1);
            }
            || ()
        });
    }

    let on_search_input = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |e: InputEvent| {
            let Some(input) = e.target_dyn_into::<HtmlInputElement>() else {
                return;
            };
            let ticket = session.set_query(&input.value(), now_ms());
            update.force_update();

            if let Some(ticket) = ticket {
                let session = session.clone();
                let update = update.clone();
                let delay = session.search_delay_ms();
                spawn_local(async move {
                    sleep(Duration::from_millis(delay as u64)).await;
                    if session.fire_search(ticket).await {
                        update.force_update();
                    }
                });
            }
        })
    };

    let config = session.config();
    let sort_spec = (*sort_override).unwrap_or(config.sort_options);

    let on_sort_rule = {
        let sort_override = sort_override.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                if let Some(rule) = SortRule::ALL.get(select.selected_index().max(0) as usize) {
                    sort_override.set(Some(SortSpec { rule: *rule, ..sort_spec }));
                }
            }
        })
    };

    let on_sort_direction = {
        let sort_override = sort_override.clone();
        Callback::from(move |_: MouseEvent| {
            sort_override.set(Some(SortSpec {
                ascending: !sort_spec.ascending,
                ..sort_spec
            }));
        })
    };

    let on_sort = action(&session, &update, move |s| async move {
        s.sort(Some(sort_spec)).await;
    });
    let on_group = action(&session, &update, |s| async move {
        s.group().await;
    });
    let on_ungroup = action(&session, &update, |s| async move {
        s.ungroup().await;
    });
    let on_close_selected = action(&session, &update, |s| async move {
        s.close_selected().await;
    });
    let on_group_selected = action(&session, &update, |s| async move {
        s.group_selected().await;
    });

    let on_select_all = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |_: MouseEvent| {
            session.select_all_visible();
            update.force_update();
        })
    };

    let on_clear_selection = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |_: MouseEvent| {
            session.clear_selection();
            update.force_update();
        })
    };

    let on_toggle_select = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |tab_id: i32| {
            session.toggle_selected(tab_id);
            update.force_update();
        })
    };

    let on_facet = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |choice: FacetChoice| {
            session.toggle_facet(choice);
            update.force_update();
        })
    };

    let on_activate_tab = {
        let session = session.clone();
        Callback::from(move |tab_id: i32| {
            open_target(session.clone(), NavTarget::SwitchToTab(tab_id));
        })
    };

    let on_open_bookmark = {
        let session = session.clone();
        Callback::from(move |url: String| {
            open_target(session.clone(), NavTarget::OpenUrl(url));
        })
    };

    let on_close_tab = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |tab_id: i32| {
            let session = session.clone();
            let update = update.clone();
            spawn_local(async move {
                session.close_tab(tab_id).await;
                update.force_update();
            });
        })
    };

    let on_open_folder = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |name: String| {
            let session = session.clone();
            let update = update.clone();
            spawn_local(async move {
                session.open_bookmark_group(&name).await;
                update.force_update();
            });
        })
    };

    let on_toggle_folder = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |name: String| {
            session.toggle_bookmark_group(&name);
            update.force_update();
        })
    };

    let on_show_all_folders = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |_: MouseEvent| {
            session.show_all_bookmark_groups(true);
            update.force_update();
        })
    };

    let on_dismiss = {
        let session = session.clone();
        let update = update.clone();
        Callback::from(move |id: Uuid| {
            session.dismiss_toast(id);
            update.force_update();
        })
    };

    let on_stats = {
        let show_stats = show_stats.clone();
        Callback::from(move |_: MouseEvent| show_stats.set(!*show_stats))
    };

    let search = session.search_state();
    let is_busy = session.is_busy();
    let selected = session.selected_ids();
    let items = session.navigation_items();
    let active_id = items
        .get(session.cursor().unwrap_or(usize::MAX))
        .map(NavigationItem::id);
    let tab_count = session.tabs().len();

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Tab Organizer"}</h1>

            <ToastStack toasts={session.toasts()} on_dismiss={on_dismiss} />

            if let Some(op) = session.gate().running() {
                <div class="loading-text-center">
                    <Spinner />
                    <p class="loading-text">{op.label()}</p>
                </div>
            }

            // Search
            <div class="search-container">
                <input
                    ref={search_input}
                    type="text"
                    placeholder="Search tabs and bookmarks... ( / )"
                    value={search.query.clone()}
                    oninput={on_search_input}
                    class="search-input"
                />
                if search.is_searching {
                    <span class="search-pending">{"…"}</span>
                }
            </div>

            <FacetChips facets={session.facets()} counts={session.facet_counts()} on_toggle={on_facet} />

            // Window actions
            <div class="flex-column-gap">
                <div class="sort-controls">
                    <select onchange={on_sort_rule} disabled={is_busy}>
                        {for SortRule::ALL.iter().map(|rule| html! {
                            <option selected={*rule == sort_spec.rule}>{rule.label()}</option>
                        })}
                    </select>
                    <button class="sort-direction" onclick={on_sort_direction} disabled={is_busy}>
                        {if sort_spec.ascending { "↑" } else { "↓" }}
                    </button>
                    <Button onclick={on_sort} disabled={is_busy} variant={ButtonVariant::Secondary}>
                        {"Sort Tabs"}
                    </Button>
                </div>
                <Button onclick={on_group} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                    {"Group by Domain"}
                </Button>
                <Button onclick={on_ungroup} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                    {"Ungroup All"}
                </Button>
            </div>

            // Selection
            <div class="selection-bar">
                if selected.is_empty() {
                    <Button onclick={on_select_all} variant={ButtonVariant::Link}>{"Select all"}</Button>
                } else {
                    <span class="selection-count">{format!("{} selected", selected.len())}</span>
                    <Button onclick={on_group_selected} disabled={is_busy} variant={ButtonVariant::Secondary}>
                        {"Group"}
                    </Button>
                    <Button onclick={on_close_selected} disabled={is_busy} variant={ButtonVariant::Danger}>
                        {"Close"}
                    </Button>
                    <Button onclick={on_clear_selection} variant={ButtonVariant::Link}>{"Clear"}</Button>
                }
            </div>

            // Bookmarks, only while a query is applied
            if !search.debounced_query.trim().is_empty() {
                <div class="bookmark-results">
                    {for session.bookmark_groups().into_iter().map(|group| {
                        let collapsed = session.is_bookmark_group_collapsed(&group.name);
                        html! {
                            <BookmarkGroupView
                                group={group}
                                collapsed={collapsed}
                                active_id={active_id.clone()}
                                on_toggle={on_toggle_folder.clone()}
                                on_open={on_open_bookmark.clone()}
                                on_open_all={on_open_folder.clone()}
                            />
                        }
                    })}
                    if session.hidden_bookmark_groups() > 0 {
                        <Button onclick={on_show_all_folders} variant={ButtonVariant::Link}>
                            {format!("Show {} more folders", session.hidden_bookmark_groups())}
                        </Button>
                    }
                </div>
            }

            // Tabs
            <div class="tab-list">
                {for items.iter().filter_map(|item| match item {
                    NavigationItem::Tab(tab) => Some(tab),
                    NavigationItem::Bookmark(_) => None,
                }).map(|tab| html! {
                    <TabRow
                        tab={tab.clone()}
                        active={session.is_item_selected(&format!("tab-{}", tab.id))}
                        selected={session.is_selected(tab.id)}
                        on_activate={on_activate_tab.clone()}
                        on_toggle_select={on_toggle_select.clone()}
                        on_close={on_close_tab.clone()}
                    />
                })}
            </div>

            <Button onclick={on_stats} variant={ButtonVariant::Link}>
                {if *show_stats { "Hide domains" } else { "Top domains" }}
            </Button>
            if *show_stats {
                <div class="stats-container">
                    <h2 class="stats-title">{"Top 10 Domains"}</h2>
                    <div class="stats-box">
                        {for TabStats::from_tabs(&session.tabs()).top_domains.into_iter().map(|stat| html! {
                            <div class="stat-item">
                                <span class="stat-domain">{stat.domain}</span>
                                <span class="stat-count">{stat.count}</span>
                            </div>
                        })}
                    </div>
                </div>
            }

            <p class="footer-popup">
                {format!("{} tabs • Tab Organizer v0.1.0", tab_count)}
            </p>
        </div>
    }
}

// Helper functions

/// Click handler running a session operation, re-rendering when it is done
fn action<F, Fut>(session: &Rc<Session>, update: &UseForceUpdateHandle, run: F) -> Callback<MouseEvent>
where
    F: Fn(Rc<Session>) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let session = session.clone();
    let update = update.clone();
    Callback::from(move |_: MouseEvent| {
        let work = run(session.clone());
        let update = update.clone();
        spawn_local(async move {
            work.await;
            update.force_update();
        });
    })
}

fn open_target(session: Rc<Session>, target: NavTarget) {
    spawn_local(async move {
        if let KeyEffect::Activated(_) = session.activate_target(target).await {
            session.browser().close_popup();
        }
    });
}

fn scroll_to_row(id: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(id))
        .map(|row| row.scroll_into_view())
        .is_some()
}
