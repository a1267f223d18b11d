pub const DASHBOARD: &str = r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>Hearth</title>
  <style>
    body { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; margin: 24px; background: #f7f9fc; color: #14213d; }
    h1 { margin-bottom: 8px; }
    .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; }
    .card { background: white; border: 1px solid #dfe7f3; border-radius: 10px; padding: 12px; }
    button { margin: 4px 8px 0 0; }
    pre { white-space: pre-wrap; }
    #log div { margin-bottom: 6px; }
    .me { color: #5a6b8c; }
  </style>
</head>
<body>
  <h1>Hearth</h1>
  <p>Accounts, friends, transactions and reminders. Talk to it in the chat box.</p>
  <div class="grid">
    <div class="card"><h3>Chat</h3>
      <div id="log"></div>
      <div id="choices"></div>
      <input id="text" size="40" placeholder="spent 200 on lunch" />
      <button onclick="send()">Send</button>
      <button onclick="post('/api/refresh', {}).then(show)">Refresh</button>
    </div>
    <div class="card"><h3>Accounts</h3><pre id="accounts"></pre></div>
    <div class="card"><h3>Friends</h3><pre id="friends"></pre></div>
    <div class="card"><h3>Reminders</h3><div id="reminders"></div></div>
    <div class="card"><h3>Recent Transactions</h3><pre id="transactions"></pre></div>
  </div>
  <script>
    let session = sessionStorage.getItem('hearth_session');
    if (!session) {
      session = 'tab-' + Math.random().toString(36).slice(2);
      sessionStorage.setItem('hearth_session', session);
    }
    async function post(url, body) {
      const res = await fetch(url, { method: 'POST', headers: {'content-type':'application/json'}, body: JSON.stringify(body) });
      return res.json();
    }
    function line(text, cls) {
      const el = document.createElement('div');
      el.className = cls || '';
      el.textContent = text;
      document.getElementById('log').appendChild(el);
    }
    function show(reply) {
      line(reply.text);
      const box = document.getElementById('choices');
      box.innerHTML = '';
      for (const choice of reply.choices || []) {
        const btn = document.createElement('button');
        btn.textContent = choice.label;
        btn.onclick = () => {
          box.innerHTML = '';
          const req = reply.status === 'pending_confirmation'
            ? post('/api/confirm', { session_id: session, accepted: choice.value === 'yes' })
            : post('/api/chat/choice', { session_id: session, value: choice.value });
          req.then(show);
        };
        box.appendChild(btn);
      }
      loadAll();
    }
    async function send() {
      const input = document.getElementById('text');
      const text = input.value.trim();
      if (!text) return;
      input.value = '';
      line('> ' + text, 'me');
      show(await post('/api/chat', { session_id: session, text }));
    }
    async function loadAccounts() {
      const body = await (await fetch('/api/accounts')).json();
      document.getElementById('accounts').textContent =
        body.accounts.map(a => `${a.name} (${a.type}): ${a.balance}`).join('\n') + `\n\nTotal: ${body.total_balance}`;
    }
    async function loadFriends() {
      const rows = await (await fetch('/api/friends')).json();
      document.getElementById('friends').textContent =
        rows.map(f => `${f.name}: ${f.net_balance}`).join('\n') || 'No friends yet';
    }
    async function loadReminders() {
      const rows = await (await fetch('/api/reminders')).json();
      const el = document.getElementById('reminders');
      if (!rows.length) { el.innerText = 'No reminders'; return; }
      el.innerHTML = '';
      for (const r of rows) {
        const row = document.createElement('div');
        row.textContent = `${r.done ? '✓' : '•'} ${r.date} ${r.time || ''} ${r.title} `;
        if (!r.done) {
          const btn = document.createElement('button');
          btn.textContent = 'Mark done';
          btn.onclick = () => post('/api/reminders/' + r.id + '/done', { session_id: session }).then(show);
          row.appendChild(btn);
        }
        el.appendChild(row);
      }
    }
    async function loadTransactions() {
      const rows = await (await fetch('/api/transactions?limit=20')).json();
      document.getElementById('transactions').textContent =
        rows.map(t => `${t.date} | ${t.kind} | ${t.amount} | ${t.purpose}`).join('\n');
    }
    function loadAll() { loadAccounts(); loadFriends(); loadReminders(); loadTransactions(); }
    document.getElementById('text').addEventListener('keydown', e => { if (e.key === 'Enter') send(); });
    window.addEventListener('beforeunload', () => navigator.sendBeacon('/api/sessions/' + session + '/logout'));
    loadAll();
    setInterval(loadAll, 5000);
  </script>
</body>
</html>"#;
