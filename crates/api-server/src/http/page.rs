use axum::response::Html;

pub(super) async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

const CHAT_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>AI Chat</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { font-family: sans-serif; max-width: 600px; margin: auto; padding: 20px; background-color: #f7f9fc; }
        h1 { color: #1a73e8; }
        textarea { width: 100%; height: 100px; border: 1px solid #ddd; border-radius: 5px; padding: 10px; box-sizing: border-box; }
        input, select { border: 1px solid #ddd; border-radius: 5px; padding: 6px; }
        .turn { background-color: #ffffff; border: 1px solid #ddd; padding: 15px; border-radius: 5px; margin-top: 10px; white-space: pre-wrap; }
        .turn.user { border-left: 4px solid #1a73e8; }
        .error { color: red; }
        button { background-color: #1a73e8; color: white; padding: 10px 15px; border: none; border-radius: 5px; cursor: pointer; }
        .settings { margin-top: 20px; font-size: 0.9em; color: #555; }
        .settings label { display: block; margin-top: 8px; }
    </style>
</head>
<body>
    <h1>AI Chat</h1>
    <div id="history"></div>
    <form id="chat-form">
        <textarea id="prompt" placeholder="Type a prompt..."></textarea><br><br>
        <input type="file" id="knowledge" multiple accept=".txt,.md">
        <button type="submit">Send</button>
    </form>
    <div class="settings">
        <label>Model <input id="model" placeholder="gemini-1.5-flash"></label>
        <label>Temperature <input id="temperature" type="number" min="0" max="2" step="0.1"></label>
        <label>System instruction <input id="system" size="40"></label>
        <button type="button" id="save-settings">Save settings</button>
    </div>
    <script>
        async function session() {
            let token = localStorage.getItem('session_token');
            if (token) return token;
            const res = await fetch('/v1/session', { method: 'POST' });
            const body = await res.json();
            localStorage.setItem('session_token', body.session_token);
            return body.session_token;
        }

        function appendTurn(role, text) {
            const div = document.createElement('div');
            div.className = 'turn ' + role;
            div.textContent = text;
            document.getElementById('history').appendChild(div);
            return div;
        }

        async function loadHistory() {
            const token = await session();
            const res = await fetch('/v1/history?order=asc', { headers: { 'Authorization': 'Bearer ' + token } });
            if (!res.ok) return;
            const body = await res.json();
            for (const turn of body.turns) appendTurn(turn.role, turn.text);
        }

        async function loadSettings() {
            const token = await session();
            const res = await fetch('/v1/settings', { headers: { 'Authorization': 'Bearer ' + token } });
            if (!res.ok) return;
            const s = await res.json();
            document.getElementById('model').value = s.model_name;
            document.getElementById('temperature').value = s.temperature;
            document.getElementById('system').value = s.system_instruction;
        }

        document.getElementById('save-settings').addEventListener('click', async () => {
            const token = await session();
            const temperature = parseFloat(document.getElementById('temperature').value);
            await fetch('/v1/settings', {
                method: 'PUT',
                headers: { 'Authorization': 'Bearer ' + token, 'Content-Type': 'application/json' },
                body: JSON.stringify({
                    model_name: document.getElementById('model').value || null,
                    temperature: isNaN(temperature) ? null : temperature,
                    system_instruction: document.getElementById('system').value
                })
            });
        });

        async function readKnowledgeFiles() {
            const files = Array.from(document.getElementById('knowledge').files);
            return Promise.all(files.map(async f => ({ name: f.name, content: await f.text() })));
        }

        document.getElementById('chat-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            const prompt = document.getElementById('prompt').value.trim();
            if (!prompt) return;
            const token = await session();
            appendTurn('user', prompt);
            document.getElementById('prompt').value = '';
            const out = appendTurn('model', '');
            const res = await fetch('/v1/chat/stream', {
                method: 'POST',
                headers: { 'Authorization': 'Bearer ' + token, 'Content-Type': 'application/json' },
                body: JSON.stringify({ prompt: prompt, knowledge_files: await readKnowledgeFiles() })
            });
            if (!res.ok) {
                out.classList.add('error');
                out.textContent = 'Request failed (' + res.status + ')';
                return;
            }
            const reader = res.body.getReader();
            const decoder = new TextDecoder();
            while (true) {
                const { done, value } = await reader.read();
                if (done) break;
                out.textContent += decoder.decode(value, { stream: true });
            }
        });

        loadHistory().then(loadSettings);
    </script>
</body>
</html>
"##;
