//! Maximum-weight matching on general graphs.
//!
//! Edmonds' blossom algorithm in the primal-dual formulation of Galil,
//! `O(n^3)`, with integer weights so every dual update is exact. Blossom
//! leaves, expansion and augmentation use explicit work lists, so stack
//! depth does not grow with the graph.
//!
//! Endpoint `p` of edge `k` is `2k` (its first vertex) or `2k + 1` (its
//! second); `p ^ 1` is the opposite endpoint.

/// Unmatched / unset marker.
pub const NONE: usize = usize::MAX;

struct Matcher<'a> {
    n: usize,
    edges: &'a [(usize, usize, i64)],
    endpoint: Vec<usize>,
    /// Remote endpoints of the edges incident to each vertex.
    neighbors: Vec<Vec<usize>>,
    /// Remote endpoint of the matched edge, per vertex.
    mate: Vec<usize>,
    /// 0 free, 1 S, 2 T; bit 4 marks blossoms during a scan.
    label: Vec<u8>,
    label_end: Vec<usize>,
    in_blossom: Vec<usize>,
    parent: Vec<usize>,
    children: Vec<Vec<usize>>,
    base: Vec<usize>,
    endps: Vec<Vec<usize>>,
    best_edge: Vec<usize>,
    blossom_best_edges: Vec<Option<Vec<usize>>>,
    unused: Vec<usize>,
    dual: Vec<i64>,
    allowed: Vec<bool>,
    queue: Vec<usize>,
}

#[inline]
fn at(list: &[usize], j: isize) -> usize {
    list[j.rem_euclid(list.len() as isize) as usize]
}

impl<'a> Matcher<'a> {
    fn new(n: usize, edges: &'a [(usize, usize, i64)]) -> Self {
        let max_weight = edges.iter().map(|e| e.2).max().unwrap_or(0).max(0);
        let mut endpoint = Vec::with_capacity(2 * edges.len());
        let mut neighbors = vec![Vec::new(); n];
        for (k, &(i, j, _)) in edges.iter().enumerate() {
            endpoint.push(i);
            endpoint.push(j);
            neighbors[i].push(2 * k + 1);
            neighbors[j].push(2 * k);
        }
        let mut base: Vec<usize> = (0..n).collect();
        base.resize(2 * n, NONE);
        let mut dual = vec![max_weight; n];
        dual.resize(2 * n, 0);
        Self {
            n,
            edges,
            endpoint,
            neighbors,
            mate: vec![NONE; n],
            label: vec![0; 2 * n],
            label_end: vec![NONE; 2 * n],
            in_blossom: (0..n).collect(),
            parent: vec![NONE; 2 * n],
            children: vec![Vec::new(); 2 * n],
            base,
            endps: vec![Vec::new(); 2 * n],
            best_edge: vec![NONE; 2 * n],
            blossom_best_edges: vec![None; 2 * n],
            unused: (n..2 * n).collect(),
            dual,
            allowed: vec![false; edges.len()],
            queue: Vec::new(),
        }
    }

    #[inline]
    fn slack(&self, k: usize) -> i64 {
        let (i, j, w) = self.edges[k];
        self.dual[i] + self.dual[j] - 2 * w
    }

    fn leaves(&self, b: usize) -> Vec<usize> {
        if b < self.n {
            return vec![b];
        }
        let mut out = Vec::new();
        let mut stack = vec![b];
        while let Some(x) = stack.pop() {
            if x < self.n {
                out.push(x);
            } else {
                stack.extend(self.children[x].iter().rev());
            }
        }
        out
    }

    fn assign_label(&mut self, mut w: usize, mut t: u8, mut p: usize) {
        loop {
            let b = self.in_blossom[w];
            self.label[w] = t;
            self.label[b] = t;
            self.label_end[w] = p;
            self.label_end[b] = p;
            self.best_edge[w] = NONE;
            self.best_edge[b] = NONE;
            if t == 1 {
                let leaves = self.leaves(b);
                self.queue.extend(leaves);
                return;
            }
            // T-blossom: its base is matched, label the mate S
            let m = self.mate[self.base[b]];
            w = self.endpoint[m];
            t = 1;
            p = m ^ 1;
        }
    }

    /// Trace back from `v` and `w` to find a new blossom base, or `NONE`
    /// when the paths reach two different roots (an augmenting path).
    fn scan_blossom(&mut self, mut v: usize, mut w: usize) -> usize {
        let mut path = Vec::new();
        let mut base = NONE;
        while v != NONE || w != NONE {
            let mut b = self.in_blossom[v];
            if self.label[b] & 4 != 0 {
                base = self.base[b];
                break;
            }
            path.push(b);
            self.label[b] = 5;
            if self.label_end[b] == NONE {
                v = NONE;
            } else {
                v = self.endpoint[self.label_end[b]];
                b = self.in_blossom[v];
                v = self.endpoint[self.label_end[b]];
            }
            if w != NONE {
                std::mem::swap(&mut v, &mut w);
            }
        }
        for b in path {
            self.label[b] = 1;
        }
        base
    }

    fn add_blossom(&mut self, base: usize, k: usize) {
        let (mut v, mut w, _) = self.edges[k];
        let bb = self.in_blossom[base];
        let mut bv = self.in_blossom[v];
        let mut bw = self.in_blossom[w];
        let Some(b) = self.unused.pop() else {
            return;
        };
        self.base[b] = base;
        self.parent[b] = NONE;
        self.parent[bb] = b;

        let mut path = Vec::new();
        let mut endps = Vec::new();
        while bv != bb {
            self.parent[bv] = b;
            path.push(bv);
            endps.push(self.label_end[bv]);
            v = self.endpoint[self.label_end[bv]];
            bv = self.in_blossom[v];
        }
        path.push(bb);
        path.reverse();
        endps.reverse();
        endps.push(2 * k);
        while bw != bb {
            self.parent[bw] = b;
            path.push(bw);
            endps.push(self.label_end[bw] ^ 1);
            w = self.endpoint[self.label_end[bw]];
            bw = self.in_blossom[w];
        }
        self.children[b] = path.clone();
        self.endps[b] = endps;

        self.label[b] = 1;
        self.label_end[b] = self.label_end[bb];
        self.dual[b] = 0;
        for v in self.leaves(b) {
            if self.label[self.in_blossom[v]] == 2 {
                self.queue.push(v);
            }
            self.in_blossom[v] = b;
        }

        // least-slack edges from the new blossom to each neighbouring S-blossom
        let mut best_to = vec![NONE; 2 * self.n];
        for &bv in &path {
            let lists: Vec<Vec<usize>> = match self.blossom_best_edges[bv].take() {
                Some(list) => vec![list],
                None => self
                    .leaves(bv)
                    .into_iter()
                    .map(|v| self.neighbors[v].iter().map(|&p| p / 2).collect())
                    .collect(),
            };
            for list in lists {
                for k in list {
                    let (i, j, _) = self.edges[k];
                    let j = if self.in_blossom[j] == b { i } else { j };
                    let bj = self.in_blossom[j];
                    if bj != b
                        && self.label[bj] == 1
                        && (best_to[bj] == NONE || self.slack(k) < self.slack(best_to[bj]))
                    {
                        best_to[bj] = k;
                    }
                }
            }
            self.best_edge[bv] = NONE;
        }
        let best: Vec<usize> = best_to.into_iter().filter(|&k| k != NONE).collect();
        self.best_edge[b] = NONE;
        for &k in &best {
            if self.best_edge[b] == NONE || self.slack(k) < self.slack(self.best_edge[b]) {
                self.best_edge[b] = k;
            }
        }
        self.blossom_best_edges[b] = Some(best);
    }

    fn expand_blossom(&mut self, b: usize, end_stage: bool) {
        let mut stack = vec![b];
        while let Some(b) = stack.pop() {
            let children = self.children[b].clone();
            for &s in &children {
                self.parent[s] = NONE;
                if s < self.n {
                    self.in_blossom[s] = s;
                } else if end_stage && self.dual[s] == 0 {
                    stack.push(s);
                } else {
                    for v in self.leaves(s) {
                        self.in_blossom[v] = s;
                    }
                }
            }
            if !end_stage && self.label[b] == 2 {
                self.relabel_expanded(b);
            }
            self.label[b] = 0;
            self.label_end[b] = NONE;
            self.children[b].clear();
            self.endps[b].clear();
            self.base[b] = NONE;
            self.blossom_best_edges[b] = None;
            self.best_edge[b] = NONE;
            self.unused.push(b);
        }
    }

    /// Relabel the sub-blossoms of an expanded T-blossom along the even
    /// path from its entry child to its base.
    fn relabel_expanded(&mut self, b: usize) {
        let children = self.children[b].clone();
        let endps = self.endps[b].clone();
        let len = children.len() as isize;
        let entry = self.in_blossom[self.endpoint[self.label_end[b] ^ 1]];
        let Some(pos) = children.iter().position(|&c| c == entry) else {
            return;
        };
        let mut j = pos as isize;
        let (step, trick) = if j & 1 == 1 {
            j -= len;
            (1, 0)
        } else {
            (-1, 1)
        };

        let mut p = self.label_end[b];
        while j != 0 {
            let x = self.endpoint[p ^ 1];
            self.label[x] = 0;
            let q = at(&endps, j - trick as isize) ^ trick ^ 1;
            self.label[self.endpoint[q]] = 0;
            self.assign_label(x, 2, p);
            self.allowed[at(&endps, j - trick as isize) / 2] = true;
            j += step;
            p = at(&endps, j - trick as isize) ^ trick;
            self.allowed[p / 2] = true;
            j += step;
        }

        // the base child keeps label T without relabelling its mate
        let bv = at(&children, j);
        let x = self.endpoint[p ^ 1];
        self.label[x] = 2;
        self.label[bv] = 2;
        self.label_end[x] = p;
        self.label_end[bv] = p;
        self.best_edge[bv] = NONE;
        j += step;

        while at(&children, j) != entry {
            let bv = at(&children, j);
            j += step;
            if self.label[bv] == 1 {
                continue;
            }
            let reached = self.leaves(bv).into_iter().find(|&v| self.label[v] != 0);
            if let Some(v) = reached {
                self.label[v] = 0;
                let m = self.mate[self.base[bv]];
                self.label[self.endpoint[m]] = 0;
                let end = self.label_end[v];
                self.assign_label(v, 2, end);
            }
        }
    }

    /// Swap matched and unmatched edges along the even path from `v` to the
    /// base of blossom `b`, making `v` the new base.
    fn augment_blossom(&mut self, b: usize, v: usize) {
        let mut work = vec![(b, v)];
        while let Some((b, v)) = work.pop() {
            let mut t = v;
            while self.parent[t] != b {
                t = self.parent[t];
            }
            if t >= self.n {
                work.push((t, v));
            }
            let children = self.children[b].clone();
            let endps = self.endps[b].clone();
            let len = children.len() as isize;
            let Some(i) = children.iter().position(|&c| c == t) else {
                continue;
            };
            let mut j = i as isize;
            let (step, trick) = if i & 1 == 1 {
                j -= len;
                (1, 0)
            } else {
                (-1, 1)
            };
            while j != 0 {
                j += step;
                let t = at(&children, j);
                let p = at(&endps, j - trick as isize) ^ trick;
                if t >= self.n {
                    work.push((t, self.endpoint[p]));
                }
                j += step;
                let t = at(&children, j);
                if t >= self.n {
                    work.push((t, self.endpoint[p ^ 1]));
                }
                self.mate[self.endpoint[p]] = p ^ 1;
                self.mate[self.endpoint[p ^ 1]] = p;
            }
            self.children[b].rotate_left(i);
            self.endps[b].rotate_left(i);
            self.base[b] = v;
        }
    }

    fn augment_matching(&mut self, k: usize) {
        let (v, w, _) = self.edges[k];
        for (mut s, mut p) in [(v, 2 * k + 1), (w, 2 * k)] {
            loop {
                let bs = self.in_blossom[s];
                if bs >= self.n {
                    self.augment_blossom(bs, s);
                }
                self.mate[s] = p;
                if self.label_end[bs] == NONE {
                    break;
                }
                let t = self.endpoint[self.label_end[bs]];
                let bt = self.in_blossom[t];
                s = self.endpoint[self.label_end[bt]];
                let j = self.endpoint[self.label_end[bt] ^ 1];
                if bt >= self.n {
                    self.augment_blossom(bt, j);
                }
                self.mate[j] = self.label_end[bt];
                p = self.label_end[bt] ^ 1;
            }
        }
    }

    /// Grow alternating trees until an augmentation happens. Returns false
    /// when the current matching is already optimal.
    fn stage(&mut self, max_cardinality: bool) -> bool {
        let n = self.n;
        self.label.iter_mut().for_each(|l| *l = 0);
        self.best_edge.iter_mut().for_each(|e| *e = NONE);
        self.blossom_best_edges[n..].iter_mut().for_each(|e| *e = None);
        self.allowed.iter_mut().for_each(|a| *a = false);
        self.queue.clear();

        for v in 0..n {
            if self.mate[v] == NONE && self.label[self.in_blossom[v]] == 0 {
                self.assign_label(v, 1, NONE);
            }
        }

        loop {
            while let Some(v) = self.queue.pop() {
                for idx in 0..self.neighbors[v].len() {
                    let p = self.neighbors[v][idx];
                    let k = p / 2;
                    let w = self.endpoint[p];
                    if self.in_blossom[v] == self.in_blossom[w] {
                        continue;
                    }
                    let mut kslack = 0;
                    if !self.allowed[k] {
                        kslack = self.slack(k);
                        if kslack <= 0 {
                            self.allowed[k] = true;
                        }
                    }
                    if self.allowed[k] {
                        if self.label[self.in_blossom[w]] == 0 {
                            self.assign_label(w, 2, p ^ 1);
                        } else if self.label[self.in_blossom[w]] == 1 {
                            let base = self.scan_blossom(v, w);
                            if base != NONE {
                                self.add_blossom(base, k);
                            } else {
                                self.augment_matching(k);
                                return true;
                            }
                        } else if self.label[w] == 0 {
                            self.label[w] = 2;
                            self.label_end[w] = p ^ 1;
                        }
                    } else if self.label[self.in_blossom[w]] == 1 {
                        let b = self.in_blossom[v];
                        if self.best_edge[b] == NONE || kslack < self.slack(self.best_edge[b]) {
                            self.best_edge[b] = k;
                        }
                    } else if self.label[w] == 0
                        && (self.best_edge[w] == NONE || kslack < self.slack(self.best_edge[w]))
                    {
                        self.best_edge[w] = k;
                    }
                }
            }

            // no augmenting path with the current duals: pick the smallest
            // dual change that makes progress
            let mut delta_type = 0;
            let mut delta = 0i64;
            let mut delta_edge = NONE;
            let mut delta_blossom = NONE;
            if !max_cardinality {
                delta_type = 1;
                delta = self.dual[..n].iter().copied().min().unwrap_or(0);
            }
            for v in 0..n {
                if self.label[self.in_blossom[v]] == 0 && self.best_edge[v] != NONE {
                    let d = self.slack(self.best_edge[v]);
                    if delta_type == 0 || d < delta {
                        delta = d;
                        delta_type = 2;
                        delta_edge = self.best_edge[v];
                    }
                }
            }
            for b in 0..2 * n {
                if self.parent[b] == NONE && self.label[b] == 1 && self.best_edge[b] != NONE {
                    let d = self.slack(self.best_edge[b]) / 2;
                    if delta_type == 0 || d < delta {
                        delta = d;
                        delta_type = 3;
                        delta_edge = self.best_edge[b];
                    }
                }
            }
            for b in n..2 * n {
                if self.base[b] != NONE
                    && self.parent[b] == NONE
                    && self.label[b] == 2
                    && (delta_type == 0 || self.dual[b] < delta)
                {
                    delta = self.dual[b];
                    delta_type = 4;
                    delta_blossom = b;
                }
            }
            if delta_type == 0 {
                delta_type = 1;
                delta = self.dual[..n].iter().copied().min().unwrap_or(0).max(0);
            }

            for v in 0..n {
                match self.label[self.in_blossom[v]] {
                    1 => self.dual[v] -= delta,
                    2 => self.dual[v] += delta,
                    _ => {}
                }
            }
            for b in n..2 * n {
                if self.base[b] != NONE && self.parent[b] == NONE {
                    match self.label[b] {
                        1 => self.dual[b] += delta,
                        2 => self.dual[b] -= delta,
                        _ => {}
                    }
                }
            }

            match delta_type {
                1 => return false,
                2 => {
                    self.allowed[delta_edge] = true;
                    let (i, j, _) = self.edges[delta_edge];
                    let i = if self.label[self.in_blossom[i]] == 0 { j } else { i };
                    self.queue.push(i);
                }
                3 => {
                    self.allowed[delta_edge] = true;
                    let (i, _, _) = self.edges[delta_edge];
                    self.queue.push(i);
                }
                _ => self.expand_blossom(delta_blossom, false),
            }
        }
    }

    fn solve(mut self, max_cardinality: bool) -> Vec<usize> {
        let n = self.n;
        for _ in 0..n {
            if !self.stage(max_cardinality) {
                break;
            }
            // end of stage: expand S-blossoms whose dual reached zero
            for b in n..2 * n {
                if self.parent[b] == NONE
                    && self.base[b] != NONE
                    && self.label[b] == 1
                    && self.dual[b] == 0
                {
                    self.expand_blossom(b, true);
                }
            }
        }
        self.mate
            .iter()
            .map(|&p| if p == NONE { NONE } else { self.endpoint[p] })
            .collect()
    }
}

/// Compute a maximum-weight matching.
///
/// `edges` lists `(i, j, weight)` with `i != j < num_vertices`; weights
/// should be even so every dual update stays integral. With
/// `max_cardinality` the matching is maximum-weight among the
/// maximum-cardinality ones. Returns the partner of every vertex, or
/// [`NONE`].
pub fn max_weight_matching(
    num_vertices: usize,
    edges: &[(usize, usize, i64)],
    max_cardinality: bool,
) -> Vec<usize> {
    if edges.is_empty() {
        return vec![NONE; num_vertices];
    }
    Matcher::new(num_vertices, edges).solve(max_cardinality)
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = NONE;

    fn doubled(edges: &[(usize, usize, i64)]) -> Vec<(usize, usize, i64)> {
        edges.iter().map(|&(i, j, w)| (i, j, 2 * w)).collect()
    }

    fn total(edges: &[(usize, usize, i64)], mate: &[usize]) -> i64 {
        edges
            .iter()
            .filter(|&&(i, j, _)| mate[i] == j)
            .map(|e| e.2)
            .sum()
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(max_weight_matching(3, &[], false), vec![N, N, N]);
        assert_eq!(max_weight_matching(2, &[(0, 1, 2)], false), vec![1, 0]);
    }

    #[test]
    fn test_path_weight_vs_cardinality() {
        let edges = doubled(&[(0, 1, 5), (1, 2, 11), (2, 3, 5)]);
        assert_eq!(max_weight_matching(4, &edges, false), vec![N, 2, 1, N]);
        assert_eq!(max_weight_matching(4, &edges, true), vec![1, 0, 3, 2]);
    }

    #[test]
    fn test_s_blossom() {
        let edges = doubled(&[(1, 2, 8), (1, 3, 9), (2, 3, 10), (3, 4, 7)]);
        assert_eq!(max_weight_matching(5, &edges, false), vec![N, 2, 1, 4, 3]);

        let edges = doubled(&[
            (1, 2, 8),
            (1, 3, 9),
            (2, 3, 10),
            (3, 4, 7),
            (1, 6, 5),
            (4, 5, 6),
        ]);
        assert_eq!(max_weight_matching(7, &edges, false), vec![N, 6, 3, 2, 5, 4, 1]);
    }

    #[test]
    fn test_t_blossom() {
        let edges = doubled(&[
            (1, 2, 9),
            (1, 3, 8),
            (2, 3, 10),
            (1, 4, 5),
            (4, 5, 4),
            (1, 6, 3),
        ]);
        assert_eq!(max_weight_matching(7, &edges, false), vec![N, 6, 3, 2, 5, 4, 1]);
    }

    #[test]
    fn test_nested_s_blossom() {
        let edges = doubled(&[
            (1, 2, 9),
            (1, 3, 9),
            (2, 3, 10),
            (2, 4, 8),
            (3, 5, 8),
            (4, 5, 10),
            (5, 6, 6),
        ]);
        assert_eq!(max_weight_matching(7, &edges, false), vec![N, 3, 4, 1, 2, 6, 5]);
    }

    #[test]
    fn test_relabel_nested_s_blossom() {
        let edges = doubled(&[
            (1, 2, 10),
            (1, 7, 10),
            (2, 3, 12),
            (3, 4, 20),
            (3, 5, 20),
            (4, 5, 25),
            (5, 6, 10),
            (6, 7, 10),
            (7, 8, 8),
        ]);
        assert_eq!(
            max_weight_matching(9, &edges, false),
            vec![N, 2, 1, 4, 3, 6, 5, 8, 7]
        );
    }

    #[test]
    fn test_nasty_t_blossom_expansion() {
        let edges = doubled(&[
            (1, 2, 45),
            (1, 5, 45),
            (2, 3, 50),
            (3, 4, 45),
            (4, 5, 50),
            (1, 6, 30),
            (3, 9, 35),
            (4, 8, 35),
            (5, 7, 26),
            (9, 10, 5),
        ]);
        assert_eq!(
            max_weight_matching(11, &edges, false),
            vec![N, 6, 3, 2, 8, 7, 1, 5, 4, 10, 9]
        );
    }

    #[test]
    fn test_matches_brute_force_on_odd_cycles() {
        // two triangles joined by a bridge plus a pendant
        let edges = doubled(&[
            (0, 1, 7),
            (1, 2, 4),
            (2, 0, 6),
            (2, 3, 9),
            (3, 4, 3),
            (4, 5, 8),
            (5, 3, 5),
            (5, 6, 2),
        ]);
        let mate = max_weight_matching(7, &edges, false);
        for v in 0..7 {
            if mate[v] != N {
                assert_eq!(mate[mate[v]], v);
            }
        }

        let mut best = 0;
        for mask in 0u32..(1 << edges.len()) {
            let mut used = [false; 7];
            let mut weight = 0;
            let mut ok = true;
            for (k, &(i, j, w)) in edges.iter().enumerate() {
                if mask & (1 << k) != 0 {
                    if used[i] || used[j] {
                        ok = false;
                        break;
                    }
                    used[i] = true;
                    used[j] = true;
                    weight += w;
                }
            }
            if ok {
                best = best.max(weight);
            }
        }
        assert_eq!(total(&edges, &mate), best);
    }
}
