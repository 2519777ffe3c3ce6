#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use harvester_engine::{Align, Dom, DomError, DomResult, ScrollTarget, Selectors, Viewport};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Visible fields of one fake comment.
#[derive(Debug, Clone)]
pub struct CommentFixture {
    pub author: String,
    pub href: Option<String>,
    pub level: Option<u8>,
    pub text: String,
    pub likes: String,
    pub time: String,
}

pub fn comment(author: &str, text: &str) -> CommentFixture {
    CommentFixture {
        author: author.to_string(),
        href: Some(format!("//space.bilibili.com/{}", author.len())),
        level: Some(4),
        text: text.to_string(),
        likes: "3".to_string(),
        time: "2天前".to_string(),
    }
}

/// `count` replies numbered from `first`.
pub fn replies(first: usize, count: usize) -> Vec<CommentFixture> {
    (first..first + count)
        .map(|n| comment(&format!("replier{n}"), &format!("reply {n}")))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Plain,
    ShowMore(NodeId),
    NextPage(NodeId),
}

#[derive(Debug)]
struct Node {
    text: String,
    attrs: HashMap<String, String>,
    /// Shadow-root children keyed by the exact selector that finds them.
    shadow: Vec<(String, NodeId)>,
    role: Role,
}

#[derive(Debug)]
struct ReplySection {
    pages: Vec<Vec<NodeId>>,
    current: usize,
    expanded: bool,
    show_more: Option<NodeId>,
    next: NodeId,
    page_number: NodeId,
    /// Pages accumulate instead of replacing each other.
    append: bool,
    /// The section detaches once this page index is reached.
    detach_at_page: Option<usize>,
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<Node>,
    container: NodeId,
    container_available: bool,
    threads: Vec<NodeId>,
    rendered: usize,
    render_step: usize,
    sections: HashMap<NodeId, ReplySection>,
    detached: HashSet<NodeId>,
    /// Stale until the container is scanned again.
    transient_stale: HashSet<NodeId>,
    /// Go stale on their next access.
    flaky: HashSet<NodeId>,
    offset: f64,
    height: f64,
    document_height: f64,
    fully_visible: bool,
    fail_navigation: bool,
    navigations: Vec<String>,
    clicks: usize,
    /// Scrolls that centred a thread in the viewport.
    centred_threads: usize,
}

/// In-memory page with the shape of a bilibili comment section: every
/// component hides its children in a shadow root, threads render a few at a
/// time when the window reaches the bottom, and reply sections paginate.
pub struct FakePage {
    selectors: Selectors,
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new() -> Self {
        let selectors = Selectors::default();
        let mut state = PageState {
            nodes: Vec::new(),
            container: NodeId(0),
            container_available: true,
            threads: Vec::new(),
            rendered: 0,
            render_step: 2,
            sections: HashMap::new(),
            detached: HashSet::new(),
            transient_stale: HashSet::new(),
            flaky: HashSet::new(),
            offset: 0.0,
            height: 800.0,
            document_height: 2_000.0,
            fully_visible: true,
            fail_navigation: false,
            navigations: Vec::new(),
            clicks: 0,
            centred_threads: 0,
        };
        state.container = state.add(Node::plain(""));
        Self {
            selectors,
            state: Mutex::new(state),
        }
    }

    /// Threads rendered before any scrolling, and per bottom scroll after that.
    pub fn with_rendering(self, initial: usize, step: usize) -> Self {
        {
            let mut state = self.lock();
            state.rendered = initial;
            state.render_step = step;
        }
        self
    }

    pub fn without_container(self) -> Self {
        self.lock().container_available = false;
        self
    }

    pub fn failing_navigation(self) -> Self {
        self.lock().fail_navigation = true;
        self
    }

    pub fn partially_visible(self) -> Self {
        self.lock().fully_visible = false;
        self
    }

    /// Adds a thread whose replies are spread over `pages`.
    pub fn add_thread(&self, main: &CommentFixture, pages: &[Vec<CommentFixture>]) -> NodeId {
        self.add_thread_with(main, pages, false)
    }

    pub fn add_thread_with(
        &self,
        main: &CommentFixture,
        pages: &[Vec<CommentFixture>],
        append: bool,
    ) -> NodeId {
        let mut state = self.lock();
        let comment = state.add_comment(main);
        let mut thread = Node::plain("");
        thread
            .shadow
            .push((self.selectors.main_comment.clone(), comment));

        if !pages.is_empty() {
            let root = state.add_reply_section(&self.selectors, pages, append);
            thread
                .shadow
                .push((self.selectors.replies_root.clone(), root));
        }
        let id = state.add(thread);
        state.threads.push(id);
        id
    }

    /// A thread whose comment has only unstructured text.
    pub fn add_raw_thread(&self, text: &str) -> NodeId {
        let mut state = self.lock();
        let comment = state.add(Node::plain(text));
        let mut thread = Node::plain(text);
        thread
            .shadow
            .push((self.selectors.main_comment.clone(), comment));
        let id = state.add(thread);
        state.threads.push(id);
        id
    }

    /// A standalone comment element, as a reply renderer would be.
    pub fn add_comment(&self, fixture: &CommentFixture) -> NodeId {
        self.lock().add_comment(fixture)
    }

    /// A comment element whose fields only resolve through fallback selectors.
    pub fn add_fallback_comment(&self, fixture: &CommentFixture) -> NodeId {
        self.lock().add_fallback_comment(fixture)
    }

    pub fn add_text_node(&self, text: &str) -> NodeId {
        self.lock().add(Node::plain(text))
    }

    /// The reply section root of `thread`.
    pub fn replies_root(&self, thread: NodeId) -> Option<NodeId> {
        let state = self.lock();
        state.nodes[thread.0]
            .shadow
            .iter()
            .find(|(sel, _)| *sel == self.selectors.replies_root)
            .map(|(_, id)| *id)
    }

    pub fn detach_section_at_page(&self, thread: NodeId, page: usize) {
        if let Some(root) = self.replies_root(thread) {
            if let Some(section) = self.lock().sections.get_mut(&root) {
                section.detach_at_page = Some(page);
            }
        }
    }

    pub fn detach(&self, node: NodeId) {
        self.lock().detached.insert(node);
    }

    /// `node` fails with a stale error on its next access and recovers once
    /// the container is scanned again.
    pub fn go_stale_once(&self, node: NodeId) {
        self.lock().flaky.insert(node);
    }

    pub fn clicks(&self) -> usize {
        self.lock().clicks
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn centred_threads(&self) -> usize {
        self.lock().centred_threads
    }

    pub fn rendered(&self) -> usize {
        self.lock().rendered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }
}

impl Node {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
            shadow: Vec::new(),
            role: Role::Plain,
        }
    }

    fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

impl PageState {
    fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn add_with_children(&mut self, text: &str, children: Vec<(&str, NodeId)>) -> NodeId {
        let mut node = Node::plain(text);
        node.shadow = children
            .into_iter()
            .map(|(sel, id)| (sel.to_string(), id))
            .collect();
        self.add(node)
    }

    fn add_comment(&mut self, fixture: &CommentFixture) -> NodeId {
        let mut name = Node::plain(&fixture.author);
        if let Some(href) = &fixture.href {
            name = name.with_attr("href", href);
        }
        let name = self.add(name);
        let mut user_children = vec![("#user-name a", name)];
        if let Some(level) = fixture.level {
            let icon = self.add(Node::plain("").with_attr(
                "src",
                &format!("https://i0.hdslb.com/bfs/seed/level_{level}.svg"),
            ));
            user_children.push(("#user-level img", icon));
        }
        let user = self.add_with_children("", user_children);

        let contents = self.add(Node::plain(&fixture.text));
        let rich = self.add_with_children("", vec![("#contents", contents)]);

        let like = self.add(Node::plain(&fixture.likes));
        let date = self.add(Node::plain(&fixture.time));
        let actions =
            self.add_with_children("", vec![("#like #count", like), ("#pubdate", date)]);

        let full_text = format!("{} {} {}", fixture.author, fixture.text, fixture.time);
        self.add_with_children(
            &full_text,
            vec![
                ("bili-comment-user-info", user),
                ("bili-rich-text", rich),
                ("bili-comment-action-buttons-renderer", actions),
            ],
        )
    }

    fn add_fallback_comment(&mut self, fixture: &CommentFixture) -> NodeId {
        let name = self.add(Node::plain(&fixture.author));
        let user = self.add_with_children("", vec![("#user-name span", name)]);
        let text = self.add(Node::plain(&fixture.text));
        let rich = self.add_with_children("", vec![("span", text)]);
        let like = self.add(Node::plain(&fixture.likes));
        let date = self.add(Node::plain(&fixture.time));
        let actions = self.add_with_children(
            "",
            vec![("span.bili-comment__action--count", like), ("span", date)],
        );
        self.add_with_children(
            &fixture.text,
            vec![
                ("bili-comment-user-info", user),
                ("bili-rich-text", rich),
                ("bili-comment-action-buttons-renderer", actions),
            ],
        )
    }

    fn add_reply_section(
        &mut self,
        selectors: &Selectors,
        pages: &[Vec<CommentFixture>],
        append: bool,
    ) -> NodeId {
        let page_ids: Vec<Vec<NodeId>> = pages
            .iter()
            .map(|page| page.iter().map(|fixture| self.add_comment(fixture)).collect())
            .collect();
        let root = self.add(Node::plain(""));

        let show_more = if page_ids.iter().any(|p| !p.is_empty()) {
            let label = self.add(Node::plain(&format!(
                "共{}条回复, 点击查看",
                pages.iter().map(Vec::len).sum::<usize>()
            )));
            let mut button = Node::plain("");
            button
                .shadow
                .push((selectors.button_label.clone(), label));
            button.role = Role::ShowMore(root);
            Some(self.add(button))
        } else {
            None
        };

        let next_label = self.add(Node::plain(&selectors.next_page_label));
        let mut next = Node::plain("");
        next.shadow.push((selectors.button_label.clone(), next_label));
        next.role = Role::NextPage(root);
        let next = self.add(next);

        let number_label = self.add(Node::plain("2"));
        let mut number = Node::plain("");
        number
            .shadow
            .push((selectors.button_label.clone(), number_label));
        let page_number = self.add(number);

        self.sections.insert(
            root,
            ReplySection {
                pages: page_ids,
                current: 0,
                expanded: false,
                show_more,
                next,
                page_number,
                append,
                detach_at_page: None,
            },
        );
        root
    }

    fn check(&mut self, id: NodeId) -> DomResult<()> {
        if self.detached.contains(&id) || self.transient_stale.contains(&id) {
            return Err(DomError::Stale(format!("{id:?} is detached")));
        }
        if self.flaky.remove(&id) {
            self.transient_stale.insert(id);
            return Err(DomError::Stale(format!("{id:?} was re-rendered")));
        }
        Ok(())
    }

    fn clamp_offset(&mut self, y: f64) {
        let max = (self.document_height - self.height).max(0.0);
        self.offset = y.clamp(0.0, max);
    }

    fn visible_replies(&self, section: &ReplySection) -> Vec<NodeId> {
        if section.show_more.is_some() && !section.expanded {
            return Vec::new();
        }
        if section.append {
            section.pages[..=section.current].concat()
        } else {
            section.pages.get(section.current).cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl Dom for FakePage {
    type Handle = NodeId;

    async fn navigate_to(&self, url: &str) -> DomResult<()> {
        let mut state = self.lock();
        if state.fail_navigation {
            return Err(DomError::Driver("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn find_in_document(&self, selector: &str) -> DomResult<Option<NodeId>> {
        let state = self.lock();
        if selector == self.selectors.container && state.container_available {
            Ok(Some(state.container))
        } else {
            Ok(None)
        }
    }

    async fn query_one(&self, host: &NodeId, selector: &str) -> DomResult<Option<NodeId>> {
        Ok(self.query_all(host, selector).await?.into_iter().next())
    }

    async fn query_all(&self, host: &NodeId, selector: &str) -> DomResult<Vec<NodeId>> {
        let mut state = self.lock();
        state.check(*host)?;

        if *host == state.container && selector == self.selectors.thread {
            state.transient_stale.clear();
            let rendered = state.rendered.min(state.threads.len());
            return Ok(state.threads[..rendered].to_vec());
        }
        if let Some(section) = state.sections.get(host) {
            if selector == self.selectors.reply {
                return Ok(state.visible_replies(section));
            }
            if selector == self.selectors.button {
                return Ok(section
                    .show_more
                    .filter(|_| !section.expanded)
                    .into_iter()
                    .collect());
            }
            if selector == self.selectors.pager_button {
                let open = section.show_more.is_none() || section.expanded;
                if open && section.current + 1 < section.pages.len() {
                    return Ok(vec![section.page_number, section.next]);
                }
                return Ok(Vec::new());
            }
        }
        Ok(state.nodes[host.0]
            .shadow
            .iter()
            .filter(|(sel, _)| sel == selector)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn text(&self, element: &NodeId) -> DomResult<String> {
        let mut state = self.lock();
        state.check(*element)?;
        Ok(state.nodes[element.0].text.clone())
    }

    async fn attribute(&self, element: &NodeId, name: &str) -> DomResult<Option<String>> {
        let mut state = self.lock();
        state.check(*element)?;
        Ok(state.nodes[element.0].attrs.get(name).cloned())
    }

    async fn click(&self, element: &NodeId) -> DomResult<()> {
        let mut state = self.lock();
        state.check(*element)?;
        state.clicks += 1;
        let role = state.nodes[element.0].role;
        match role {
            Role::Plain => {}
            Role::ShowMore(root) => {
                if let Some(section) = state.sections.get_mut(&root) {
                    section.expanded = true;
                }
            }
            Role::NextPage(root) => {
                let mut detach = false;
                if let Some(section) = state.sections.get_mut(&root) {
                    if section.current + 1 < section.pages.len() {
                        section.current += 1;
                    }
                    detach = section.detach_at_page == Some(section.current);
                }
                if detach {
                    state.detached.insert(root);
                }
            }
        }
        Ok(())
    }

    async fn scroll_to(&self, target: ScrollTarget<'_, NodeId>) -> DomResult<()> {
        let mut state = self.lock();
        match target {
            ScrollTarget::Offset(y) => state.clamp_offset(y),
            ScrollTarget::Top => state.offset = 0.0,
            ScrollTarget::Bottom => {
                if state.rendered < state.threads.len() {
                    state.rendered += state.render_step;
                    state.document_height += 600.0;
                }
                let bottom = state.document_height;
                state.clamp_offset(bottom);
            }
            ScrollTarget::Element(element, align) => {
                state.check(*element)?;
                if align == Align::Center && state.threads.contains(element) {
                    state.centred_threads += 1;
                }
            }
        }
        Ok(())
    }

    async fn scroll_container_to(&self, container: &NodeId, _fraction: f64) -> DomResult<()> {
        self.lock().check(*container)
    }

    async fn is_fully_visible(&self, element: &NodeId) -> DomResult<bool> {
        let mut state = self.lock();
        state.check(*element)?;
        Ok(state.fully_visible)
    }

    async fn viewport(&self) -> DomResult<Viewport> {
        let state = self.lock();
        Ok(Viewport {
            offset: state.offset,
            height: state.height,
            document_height: state.document_height,
        })
    }
}
