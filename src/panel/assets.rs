//! Static assets for the tablet panel page (spec §4.9, `GET /`).

/// Minimal replica of the 12-lamp MFA panel: one `<div>` per lamp, driven by
/// an `EventSource` subscribed to `/stream` and seeded from `/state`.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>MFA Panel</title>
<style>
  body { background: #111; font-family: sans-serif; color: #ddd; }
  .panel { display: grid; grid-template-columns: repeat(6, 1fr); gap: 8px; max-width: 720px; margin: 2rem auto; }
  .lamp { aspect-ratio: 1; border-radius: 6px; background: #222; border: 2px solid #333;
          display: flex; align-items: center; justify-content: center; font-weight: bold; }
  .lamp.lit { background: var(--lit-color, #ff3); border-color: #fff; }
</style>
</head>
<body>
<div class="panel" id="panel"></div>
<script src="/panel.js"></script>
</body>
</html>"#;

/// Client script: renders twelve lamp cells, applies `/state`, then follows
/// `/stream` SSE deltas.
pub const PANEL_JS: &str = r#"const panel = document.getElementById('panel');
const cells = [];
for (let i = 1; i <= 12; i++) {
  const cell = document.createElement('div');
  cell.className = 'lamp';
  cell.textContent = i;
  panel.appendChild(cell);
  cells[i] = cell;
}

function applyLamp(lamp, state) {
  const cell = cells[lamp];
  if (!cell) return;
  cell.classList.toggle('lit', state === 1);
}

fetch('/state').then(r => r.json()).then(snapshot => {
  for (const entry of snapshot.lamps) applyLamp(entry.lamp, entry.state);
});

const source = new EventSource('/stream');
source.onmessage = (event) => {
  const payload = JSON.parse(event.data);
  applyLamp(payload.lamp, payload.state);
};
"#;
