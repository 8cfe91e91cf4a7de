//! KWin scripting backend.
//!
//! On a KWin session windows are placed by a script running inside the
//! compositor. The script is rendered from the same cell table as
//! `layout::compute_layout`, so both backends produce identical geometry, and
//! is loaded for the lifetime of the daemon over the `org.kde.kwin.Scripting`
//! D-Bus interface.

use crate::error::Result;
use crate::layout::{layout_cells, Edge, OverflowPolicy, TileOptions, MAX_TILED};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};
use zbus::{Connection, Proxy};

const KWIN_SERVICE: &str = "org.kde.KWin";
const KWIN_SCRIPTING_PATH: &str = "/Scripting";
const KWIN_SCRIPTING_INTERFACE: &str = "org.kde.kwin.Scripting";

fn edge_index(edge: Edge) -> u8 {
    match edge {
        Edge::Start => 0,
        Edge::Half => 1,
        Edge::End => 2,
    }
}

/// Сгенерировать текст KWin скрипта для окон класса `target_class`
pub fn render_script(target_class: &str, options: TileOptions) -> String {
    let mut layouts = String::from("var LAYOUTS = [\n    [],\n");
    for count in 1..=MAX_TILED {
        let cells = layout_cells(count, options.two_player).unwrap_or(&[]);
        let rendered: Vec<String> = cells
            .iter()
            .map(|c| {
                format!(
                    "[{}, {}, {}, {}]",
                    edge_index(c.left),
                    edge_index(c.top),
                    edge_index(c.right),
                    edge_index(c.bottom)
                )
            })
            .collect();
        let _ = writeln!(layouts, "    [{}],", rendered.join(", "));
    }
    layouts.push_str("];\n");

    let overflow = match options.overflow {
        OverflowPolicy::TileFirst => "tile_first",
        OverflowPolicy::Skip => "skip",
    };

    format!(
        r#"// Generated by gamescope-tiler {version}
var TARGET_CLASS = {class:?};
var DISABLE_BORDERS = {borders};
var OVERFLOW = "{overflow}";
var MAX_TILED = {max};
{layouts}
function edge(e, extent) {{
    if (e == 0) return 0;
    if (e == 1) return Math.floor(extent / 2);
    return extent;
}}

function gamescopeTiler() {{
    var screen = workspace.activeScreen.geometry;
    var all = workspace.windowList();
    var matched = [];

    for (var i = 0; i < all.length; i++) {{
        if (String(all[i].resourceClass).toLowerCase() == TARGET_CLASS) {{
            matched.push(all[i]);
        }}
    }}

    if (matched.length == 0) {{
        return;
    }}
    if (matched.length > MAX_TILED) {{
        if (OVERFLOW == "skip") {{
            return;
        }}
        matched = matched.slice(0, MAX_TILED);
    }}

    var cells = LAYOUTS[matched.length];
    for (var i = 0; i < matched.length; i++) {{
        var c = cells[i];
        var x0 = edge(c[0], screen.width);
        var y0 = edge(c[1], screen.height);
        var x1 = edge(c[2], screen.width);
        var y1 = edge(c[3], screen.height);
        if (DISABLE_BORDERS) {{
            matched[i].noBorder = true;
        }}
        matched[i].frameGeometry = {{
            x: screen.x + x0,
            y: screen.y + y0,
            width: x1 - x0,
            height: y1 - y0
        }};
    }}
}}

workspace.windowAdded.connect(gamescopeTiler);
workspace.windowRemoved.connect(gamescopeTiler);
"#,
        version = env!("CARGO_PKG_VERSION"),
        class = target_class.to_ascii_lowercase(),
        borders = options.disable_borders,
        overflow = overflow,
        max = MAX_TILED,
        layouts = layouts,
    )
}

/// Методы `org.kde.kwin.Scripting`, которые нужны для жизненного цикла скрипта
#[async_trait::async_trait]
trait Scripting: Send + Sync {
    async fn is_script_loaded(&self, plugin_name: &str) -> Result<bool>;
    async fn load_script(&self, path: &str, plugin_name: &str) -> Result<i32>;
    async fn start(&self) -> Result<()>;
    async fn unload_script(&self, plugin_name: &str) -> Result<bool>;
}

struct DbusScripting {
    proxy: Proxy<'static>,
}

#[async_trait::async_trait]
impl Scripting for DbusScripting {
    async fn is_script_loaded(&self, plugin_name: &str) -> Result<bool> {
        Ok(self.proxy.call("isScriptLoaded", &(plugin_name,)).await?)
    }

    async fn load_script(&self, path: &str, plugin_name: &str) -> Result<i32> {
        Ok(self.proxy.call("loadScript", &(path, plugin_name)).await?)
    }

    async fn start(&self) -> Result<()> {
        Ok(self.proxy.call("start", &()).await?)
    }

    async fn unload_script(&self, plugin_name: &str) -> Result<bool> {
        Ok(self.proxy.call("unloadScript", &(plugin_name,)).await?)
    }
}

/// Загрузить и запустить скрипт. Если запуск не удался, скрипт выгружается обратно.
async fn install(api: &dyn Scripting, path: &str, plugin_name: &str) -> Result<()> {
    // Скрипт с тем же именем мог остаться от прошлого запуска
    if api.is_script_loaded(plugin_name).await? {
        warn!("Скрипт '{}' уже загружен, выгружаем старую версию", plugin_name);
        api.unload_script(plugin_name).await?;
    }

    let id = api.load_script(path, plugin_name).await?;
    debug!("KWin вернул id скрипта: {}", id);

    if let Err(e) = api.start().await {
        warn!("KWin не запустил скрипт '{}', выгружаем: {}", plugin_name, e);
        if let Err(unload) = api.unload_script(plugin_name).await {
            warn!("Не удалось выгрузить скрипт '{}': {}", plugin_name, unload);
        }
        return Err(e);
    }

    Ok(())
}

/// Загруженный в KWin скрипт; выгружается вызовом `unload`
pub struct KwinScript {
    connection: Connection,
    plugin_name: String,
    loaded: bool,
}

impl KwinScript {
    async fn scripting(connection: &Connection) -> Result<DbusScripting> {
        let proxy = Proxy::new(
            connection,
            KWIN_SERVICE,
            KWIN_SCRIPTING_PATH,
            KWIN_SCRIPTING_INTERFACE,
        )
        .await?;
        Ok(DbusScripting { proxy })
    }

    /// Записать скрипт в `path`, загрузить его в KWin под именем `plugin_name` и запустить
    pub async fn load(script: &str, path: &Path, plugin_name: &str) -> Result<Self> {
        info!("Загрузка KWin скрипта {} ({})", path.display(), plugin_name);
        std::fs::write(path, script)?;

        let connection = Connection::session().await?;
        let scripting = Self::scripting(&connection).await?;
        install(&scripting, &path.to_string_lossy(), plugin_name).await?;
        info!("KWin скрипт '{}' запущен", plugin_name);

        Ok(Self {
            connection,
            plugin_name: plugin_name.to_string(),
            loaded: true,
        })
    }

    pub async fn unload(&mut self) -> Result<()> {
        if !self.loaded {
            return Ok(());
        }

        info!("Выгрузка KWin скрипта '{}'", self.plugin_name);
        let scripting = Self::scripting(&self.connection).await?;
        scripting.unload_script(&self.plugin_name).await?;
        self.loaded = false;
        Ok(())
    }
}

impl Drop for KwinScript {
    fn drop(&mut self) {
        if self.loaded {
            warn!("KWin скрипт '{}' остался загруженным", self.plugin_name);
        }
    }
}
