/// Browser side of the live-reload protocol, served at the client script path.
///
/// Stylesheet changes swap matching `<link>` tags in place; anything else reloads.
pub fn client_script(livereload_path: &str) -> String {
    format!(
        r#"// sitepipe live-reload client
(function() {{
    'use strict';

    const SOCKET_PATH = '{path}';

    class LiveReloadClient {{
        constructor() {{
            this.ws = null;
            this.reconnectAttempts = 0;
            this.maxReconnectAttempts = 10;
            this.reconnectDelay = 1000;
            this.connect();
        }}

        url() {{
            const scheme = window.location.protocol === 'https:' ? 'wss' : 'ws';
            return `${{scheme}}://${{window.location.host}}${{SOCKET_PATH}}`;
        }}

        connect() {{
            try {{
                this.ws = new WebSocket(this.url());
            }} catch (error) {{
                console.warn('[sitepipe] Connection failed:', error);
                this.scheduleReconnect();
                return;
            }}

            this.ws.onopen = () => {{
                this.reconnectAttempts = 0;
            }};

            this.ws.onmessage = (event) => {{
                try {{
                    this.handle(JSON.parse(event.data));
                }} catch (error) {{
                    console.warn('[sitepipe] Invalid message:', error);
                }}
            }};

            this.ws.onclose = () => this.scheduleReconnect();
        }}

        handle(message) {{
            switch (message.type) {{
                case 'connected':
                    console.log('[sitepipe] Live reload connected');
                    break;
                case 'css-update':
                    if (!this.swapStylesheet(message.path)) {{
                        window.location.reload();
                    }}
                    break;
                case 'full-reload':
                    window.location.reload();
                    break;
            }}
        }}

        swapStylesheet(path) {{
            const name = path.split('/').pop();
            const links = Array.from(document.querySelectorAll('link[rel="stylesheet"]'))
                .filter((link) => new URL(link.href, window.location.href).pathname.endsWith('/' + name));

            links.forEach((link) => {{
                const next = link.cloneNode();
                const url = new URL(link.href, window.location.href);
                url.searchParams.set('t', Date.now());
                next.href = url.toString();
                next.onload = () => link.remove();
                link.parentNode.insertBefore(next, link.nextSibling);
            }});

            return links.length > 0;
        }}

        scheduleReconnect() {{
            if (this.reconnectAttempts >= this.maxReconnectAttempts) {{
                console.warn('[sitepipe] Live reload disconnected');
                return;
            }}

            this.reconnectAttempts++;
            setTimeout(() => this.connect(), this.reconnectDelay * this.reconnectAttempts);
        }}
    }}

    if (typeof window !== 'undefined') {{
        window.__SITEPIPE_LIVERELOAD__ = new LiveReloadClient();
    }}
}})();
"#,
        path = livereload_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_targets_socket_path() {
        let script = client_script("/__sitepipe/livereload");
        assert!(script.contains("const SOCKET_PATH = '/__sitepipe/livereload';"));
        assert!(script.contains("case 'css-update':"));
    }
}
